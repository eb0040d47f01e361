//! Signature extractor: copies the public key and signature out of the Apple
//! signature directory addressed by the security data directory.

use std::fmt;

use crate::domain::constants::{
    APPLE_SIGDIR_PUBLIC_KEY, APPLE_SIGDIR_SIGNATURE, RSA_KEY_SIZE,
};
use crate::domain::cursor::ByteView;
use crate::domain::pe::ImageContext;
use crate::infra::error::VerifyResult;

/// RSA-2048 key modulus and signature in both byte orders.
///
/// The image stores both little-endian; key digests are taken over the stored
/// order while the RSA primitive consumes big-endian integers.
#[derive(Clone, PartialEq, Eq)]
pub struct SignatureMaterial {
    public_key_le: [u8; RSA_KEY_SIZE],
    public_key_be: [u8; RSA_KEY_SIZE],
    signature_le: [u8; RSA_KEY_SIZE],
    signature_be: [u8; RSA_KEY_SIZE],
}

/// Byte-reversed copy of `bytes`.
#[must_use]
pub fn reversed<const N: usize>(bytes: &[u8; N]) -> [u8; N] {
    let mut out = *bytes;
    out.reverse();
    out
}

impl SignatureMaterial {
    #[must_use]
    pub fn from_stored(public_key_le: [u8; RSA_KEY_SIZE], signature_le: [u8; RSA_KEY_SIZE]) -> Self {
        Self {
            public_key_be: reversed(&public_key_le),
            signature_be: reversed(&signature_le),
            public_key_le,
            signature_le,
        }
    }

    /// Extract the key and signature of a parsed image.
    ///
    /// The whole key+signature region is bounds-checked before copying; the
    /// header parser only proved that the directory address itself is inside
    /// the buffer.
    pub fn extract(data: &[u8], ctx: &ImageContext) -> VerifyResult<Self> {
        let view = ByteView::new(data);
        let directory = u64::from(ctx.security_dir.virtual_address);
        view.bytes(
            "Apple signature directory",
            directory + APPLE_SIGDIR_PUBLIC_KEY as u64,
            2 * RSA_KEY_SIZE as u64,
        )?;
        let public_key_le =
            view.array::<RSA_KEY_SIZE>("public key", directory + APPLE_SIGDIR_PUBLIC_KEY as u64)?;
        let signature_le =
            view.array::<RSA_KEY_SIZE>("signature", directory + APPLE_SIGDIR_SIGNATURE as u64)?;
        log::debug!("Extracted Apple signature material at {directory:#x}");
        Ok(Self::from_stored(public_key_le, signature_le))
    }

    #[must_use]
    pub fn public_key_le(&self) -> &[u8; RSA_KEY_SIZE] {
        &self.public_key_le
    }
    #[must_use]
    pub fn public_key_be(&self) -> &[u8; RSA_KEY_SIZE] {
        &self.public_key_be
    }
    #[must_use]
    pub fn signature_le(&self) -> &[u8; RSA_KEY_SIZE] {
        &self.signature_le
    }
    #[must_use]
    pub fn signature_be(&self) -> &[u8; RSA_KEY_SIZE] {
        &self.signature_be
    }
}

impl fmt::Debug for SignatureMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SignatureMaterial(key={}.., sig={}..)",
            hex::encode(&self.public_key_be[..8]),
            hex::encode(&self.signature_be[..8])
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversal_is_a_pure_copy() {
        let input = [1u8, 2, 3, 4];
        assert_eq!(reversed(&input), [4, 3, 2, 1]);
        assert_eq!(input, [1, 2, 3, 4]);
    }

    #[test]
    fn both_orders_are_mirrors() {
        let mut key = [0u8; RSA_KEY_SIZE];
        let mut sig = [0u8; RSA_KEY_SIZE];
        key[0] = 0xAA;
        sig[RSA_KEY_SIZE - 1] = 0xBB;
        let material = SignatureMaterial::from_stored(key, sig);
        assert_eq!(material.public_key_be()[RSA_KEY_SIZE - 1], 0xAA);
        assert_eq!(material.signature_be()[0], 0xBB);
        assert_eq!(material.public_key_le(), &key);
        assert_eq!(material.signature_le(), &sig);
    }
}
