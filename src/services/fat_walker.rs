//! Fat-binary walker: detects the Apple EFI fat container and verifies each
//! x86/x86_64 slot through an [`ImageVerifier`].
//!
//! Slots must tile the buffer: each one starts where the previous ended (the
//! first right after the arch table) and the last one ends at the buffer end.
//! The walk stops at the first failing slot.

use crate::{
    domain::{
        fat::FatContainer,
        verification::{ContainerKind, SlotOutcome, SlotReport, VerificationReport},
    },
    services::verification::ImageVerifier,
    VerifyError, VerifyResult,
};

/// One slot visited by [`walk_slots`]; `value` is `None` for unsupported CPU types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitedSlot<T> {
    pub index: usize,
    /// `None` for bare images
    pub cpu_type: Option<u32>,
    pub offset: u64,
    pub size: u64,
    pub value: Option<T>,
}

/// Walk every image in `data`, calling `visit` on each verifiable one in slot
/// order. A bare image is visited once as a whole.
pub fn walk_slots<T>(
    data: &[u8],
    mut visit: impl FnMut(&[u8]) -> VerifyResult<T>,
) -> VerifyResult<(ContainerKind, Vec<VisitedSlot<T>>)> {
    let Some(fat) = FatContainer::parse(data)? else {
        log::debug!("Binary is not an EFI fat container, treating as single image");
        let value = visit(data)?;
        let slot = VisitedSlot {
            index: 0,
            cpu_type: None,
            offset: 0,
            size: data.len() as u64,
            value: Some(value),
        };
        return Ok((ContainerKind::Single, vec![slot]));
    };

    let image_len = data.len() as u64;
    log::debug!("EFI fat container with {} architectures", fat.arch_count);

    let mut accounted = fat.header_size();
    let mut slots = Vec::with_capacity(fat.archs.len());
    for (index, arch) in fat.archs.iter().enumerate() {
        let offset = u64::from(arch.offset);
        let end = arch.end();

        // Tiling: every slot, skipped ones included, starts exactly where the
        // previous one ended.
        if offset < accounted {
            log::debug!("Slot {index} at {offset:#x} overlaps data ending at {accounted:#x}");
            return Err(VerifyError::OutOfBounds {
                what: "fat slot overlaps previous data",
                offset,
                len: u64::from(arch.size),
                size: image_len,
            });
        }
        if offset > accounted {
            log::debug!("Slot {index} at {offset:#x} leaves a gap after {accounted:#x}");
            return Err(VerifyError::MalformedHeader(format!(
                "gap of {:#x} bytes before fat slot {index}",
                offset - accounted
            )));
        }

        let value = if arch.is_supported() {
            if offset >= image_len || end > image_len {
                return Err(VerifyError::OutOfBounds {
                    what: "fat slot",
                    offset,
                    len: u64::from(arch.size),
                    size: image_len,
                });
            }
            log::debug!("Visiting slot {index} (cpu {:#x}) at {offset:#x}", arch.cpu_type);
            // Bounds checked above.
            Some(visit(&data[offset as usize..end as usize])?)
        } else {
            log::debug!("Skipping slot {index} with cpu type {:#x}", arch.cpu_type);
            None
        };

        slots.push(VisitedSlot {
            index,
            cpu_type: Some(arch.cpu_type),
            offset,
            size: u64::from(arch.size),
            value,
        });
        accounted = end;
    }

    if accounted != image_len {
        log::debug!("Fat slots cover {accounted:#x} of {image_len:#x} bytes");
        return Err(VerifyError::MalformedHeader(format!(
            "fat slots end at {accounted:#x} but image is {image_len:#x} bytes"
        )));
    }

    Ok((
        ContainerKind::Fat {
            arch_count: fat.arch_count,
        },
        slots,
    ))
}

/// Verifies every x86/x86_64 image of a buffer through an [`ImageVerifier`].
pub struct FatBinaryWalker<'v, V: ImageVerifier> {
    verifier: &'v V,
}

impl<'v, V: ImageVerifier> FatBinaryWalker<'v, V> {
    #[must_use]
    pub fn new(verifier: &'v V) -> Self {
        Self { verifier }
    }

    /// Verify a buffer holding either a fat container or a single image.
    pub fn walk(&self, data: &[u8]) -> VerifyResult<VerificationReport> {
        let (container, visited) = walk_slots(data, |image| self.verifier.verify_image(image))?;
        let slots = visited
            .into_iter()
            .map(|slot| SlotReport {
                index: slot.index,
                cpu_type: slot.cpu_type,
                offset: slot.offset,
                size: slot.size,
                outcome: slot
                    .value
                    .map_or(SlotOutcome::Skipped, SlotOutcome::Verified),
            })
            .collect();
        Ok(VerificationReport { container, slots })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::{CPU_TYPE_X86, CPU_TYPE_X86_64, EFI_FAT_MAGIC};
    use crate::domain::crypto::ImageDigest;
    use crate::domain::pe::ImageFormat;
    use crate::domain::verification::ImageVerification;
    use std::cell::RefCell;

    /// Accepts any image whose first byte is 0xAA and records what it saw.
    #[derive(Default)]
    struct StubVerifier {
        seen: RefCell<Vec<usize>>,
    }

    impl ImageVerifier for StubVerifier {
        fn verify_image(&self, image: &[u8]) -> VerifyResult<ImageVerification> {
            self.seen.borrow_mut().push(image.len());
            if image.first() == Some(&0xAA) {
                Ok(ImageVerification {
                    format: ImageFormat::Pe32,
                    digest: ImageDigest::new([0; 32]),
                    key_name: "stub".into(),
                })
            } else {
                Err(VerifyError::SignatureMismatch("stub".into()))
            }
        }
    }

    fn fat(slots: &[(u32, u32, u32)], total: usize) -> Vec<u8> {
        let mut data = vec![0xAAu8; total];
        data[0..4].copy_from_slice(&EFI_FAT_MAGIC.to_le_bytes());
        data[4..8].copy_from_slice(&(slots.len() as u32).to_le_bytes());
        for (i, (cpu, offset, size)) in slots.iter().enumerate() {
            let base = 8 + i * 20;
            data[base..base + 4].copy_from_slice(&cpu.to_le_bytes());
            data[base + 4..base + 8].copy_from_slice(&3u32.to_le_bytes());
            data[base + 8..base + 12].copy_from_slice(&offset.to_le_bytes());
            data[base + 12..base + 16].copy_from_slice(&size.to_le_bytes());
            data[base + 16..base + 20].copy_from_slice(&0u32.to_le_bytes());
        }
        data
    }

    #[test]
    fn exact_tiling_verifies_every_supported_slot() {
        // header: 8 + 3 * 20 = 68
        let data = fat(
            &[(CPU_TYPE_X86, 68, 32), (12, 100, 10), (CPU_TYPE_X86_64, 110, 40)],
            150,
        );
        let stub = StubVerifier::default();
        let report = FatBinaryWalker::new(&stub).walk(&data).unwrap();
        assert_eq!(report.container, ContainerKind::Fat { arch_count: 3 });
        assert_eq!(report.verified_count(), 2);
        assert_eq!(report.slots[1].outcome, SlotOutcome::Skipped);
        assert_eq!(*stub.seen.borrow(), vec![32, 40]);
    }

    #[test]
    fn single_image_when_magic_absent() {
        let data = vec![0xAAu8; 300];
        let stub = StubVerifier::default();
        let report = FatBinaryWalker::new(&stub).walk(&data).unwrap();
        assert_eq!(report.container, ContainerKind::Single);
        assert_eq!(*stub.seen.borrow(), vec![300]);
    }

    #[test]
    fn gap_between_slots_is_rejected() {
        let data = fat(&[(CPU_TYPE_X86, 48, 20), (CPU_TYPE_X86_64, 70, 30)], 100);
        let stub = StubVerifier::default();
        assert!(matches!(
            FatBinaryWalker::new(&stub).walk(&data),
            Err(VerifyError::MalformedHeader(_))
        ));
    }

    #[test]
    fn overlap_between_slots_is_rejected() {
        let data = fat(&[(CPU_TYPE_X86, 48, 30), (CPU_TYPE_X86_64, 70, 30)], 100);
        let stub = StubVerifier::default();
        assert!(matches!(
            FatBinaryWalker::new(&stub).walk(&data),
            Err(VerifyError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn skipped_slots_must_also_tile() {
        let data = fat(
            &[(CPU_TYPE_X86, 68, 32), (12, 101, 9), (CPU_TYPE_X86_64, 110, 40)],
            150,
        );
        let stub = StubVerifier::default();
        assert!(matches!(
            FatBinaryWalker::new(&stub).walk(&data),
            Err(VerifyError::MalformedHeader(_))
        ));
        assert_eq!(*stub.seen.borrow(), vec![32]);
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let data = fat(&[(CPU_TYPE_X86, 28, 50)], 90);
        let stub = StubVerifier::default();
        assert!(matches!(
            FatBinaryWalker::new(&stub).walk(&data),
            Err(VerifyError::MalformedHeader(_))
        ));
    }

    #[test]
    fn slot_past_end_is_out_of_bounds() {
        let data = fat(&[(CPU_TYPE_X86, 28, 100)], 90);
        let stub = StubVerifier::default();
        assert!(matches!(
            FatBinaryWalker::new(&stub).walk(&data),
            Err(VerifyError::OutOfBounds { what: "fat slot", .. })
        ));
        assert!(stub.seen.borrow().is_empty());
    }

    #[test]
    fn first_failing_slot_aborts_walk() {
        let mut data = fat(&[(CPU_TYPE_X86, 48, 20), (CPU_TYPE_X86_64, 68, 32)], 100);
        data[48] = 0x00;
        let stub = StubVerifier::default();
        assert!(matches!(
            FatBinaryWalker::new(&stub).walk(&data),
            Err(VerifyError::SignatureMismatch(_))
        ));
        assert_eq!(*stub.seen.borrow(), vec![20]);
    }
}
