//! Bounds-checked reads over an untrusted image buffer.
//!
//! Every access of `len` bytes at `offset` first proves `offset + len <= buffer.len()`
//! with checked arithmetic and returns [`VerifyError::OutOfBounds`] otherwise.
//! Offsets are taken as `u64` because most of them come straight from 32-bit
//! header fields and are combined before they are known to be in range.

use crate::infra::error::{VerifyError, VerifyResult};

/// Read-only, bounds-checked view over a byte buffer.
#[derive(Clone, Copy, Debug)]
pub struct ByteView<'a> {
    data: &'a [u8],
}

impl<'a> ByteView<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow `len` bytes starting at `offset`.
    pub fn bytes(&self, what: &'static str, offset: u64, len: u64) -> VerifyResult<&'a [u8]> {
        let out_of_bounds = || VerifyError::OutOfBounds {
            what,
            offset,
            len,
            size: self.len(),
        };
        let end = offset.checked_add(len).ok_or_else(out_of_bounds)?;
        if end > self.len() {
            return Err(out_of_bounds());
        }
        // Both bounds are <= data.len(), so they fit in usize.
        Ok(&self.data[offset as usize..end as usize])
    }

    /// Borrow the half-open range `[start, end)`.
    pub fn range(&self, what: &'static str, start: u64, end: u64) -> VerifyResult<&'a [u8]> {
        let len = end.checked_sub(start).ok_or(VerifyError::OutOfBounds {
            what,
            offset: start,
            len: 0,
            size: self.len(),
        })?;
        self.bytes(what, start, len)
    }

    pub fn array<const N: usize>(&self, what: &'static str, offset: u64) -> VerifyResult<[u8; N]> {
        let bytes = self.bytes(what, offset, N as u64)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn u16_le(&self, what: &'static str, offset: u64) -> VerifyResult<u16> {
        self.array::<2>(what, offset).map(u16::from_le_bytes)
    }

    pub fn u32_le(&self, what: &'static str, offset: u64) -> VerifyResult<u32> {
        self.array::<4>(what, offset).map(u32::from_le_bytes)
    }

    pub fn u64_le(&self, what: &'static str, offset: u64) -> VerifyResult<u64> {
        self.array::<8>(what, offset).map(u64::from_le_bytes)
    }
}

/// `a + b` for offset arithmetic, failing with `IntegerOverflow` instead of wrapping.
pub fn checked_offset(what: &str, a: u64, b: u64) -> VerifyResult<u64> {
    a.checked_add(b)
        .ok_or_else(|| VerifyError::IntegerOverflow(format!("{what}: {a:#x} + {b:#x}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_values() {
        let data = [0x4d, 0x5a, 0x78, 0x56, 0x34, 0x12, 0, 0, 0, 0];
        let view = ByteView::new(&data);
        assert_eq!(view.u16_le("magic", 0).unwrap(), 0x5a4d);
        assert_eq!(view.u32_le("value", 2).unwrap(), 0x1234_5678);
        assert_eq!(view.u64_le("wide", 2).unwrap(), 0x1234_5678);
    }

    #[test]
    fn rejects_reads_past_the_end() {
        let data = [0u8; 8];
        let view = ByteView::new(&data);
        assert!(view.bytes("exact", 0, 8).is_ok());
        assert!(matches!(
            view.bytes("one past", 1, 8),
            Err(VerifyError::OutOfBounds { offset: 1, len: 8, size: 8, .. })
        ));
        assert!(matches!(
            view.u32_le("tail", 6),
            Err(VerifyError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn rejects_wrapping_offsets() {
        let data = [0u8; 8];
        let view = ByteView::new(&data);
        assert!(matches!(
            view.bytes("wrap", u64::MAX, 2),
            Err(VerifyError::OutOfBounds { .. })
        ));
        assert!(matches!(
            checked_offset("wrap", u64::MAX, 1),
            Err(VerifyError::IntegerOverflow(_))
        ));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let data = [0u8; 16];
        let view = ByteView::new(&data);
        assert_eq!(view.range("ok", 4, 8).unwrap().len(), 4);
        assert!(view.range("empty", 8, 8).unwrap().is_empty());
        assert!(view.range("inverted", 8, 4).is_err());
    }
}
