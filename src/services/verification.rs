//! Verification service: runs the single-image pipeline
//! (header parser -> signature extractor -> digest -> trust verifier).

use crate::{
    domain::{
        crypto::TrustTable,
        pe::parse_image,
        signature::SignatureMaterial,
        verification::ImageVerification,
    },
    services::{pe_hasher::PeHasher, trust_verifier::TrustVerifier},
    VerifyResult,
};

/// Verifies one bare PE image. The fat walker is generic over this seam so its
/// accounting can be exercised without real signatures.
pub trait ImageVerifier {
    fn verify_image(&self, image: &[u8]) -> VerifyResult<ImageVerification>;
}

/// Service performing structural & cryptographic verification of a single PE image.
pub struct VerificationService<'t> {
    trust: TrustVerifier<'t>,
    hasher: PeHasher,
}

impl<'t> VerificationService<'t> {
    #[must_use]
    pub fn new(table: &'t TrustTable) -> Self {
        Self {
            trust: TrustVerifier::new(table),
            hasher: PeHasher::new(),
        }
    }
}

impl ImageVerifier for VerificationService<'_> {
    fn verify_image(&self, image: &[u8]) -> VerifyResult<ImageVerification> {
        let ctx = parse_image(image)?;
        let material = SignatureMaterial::extract(image, &ctx)?;
        let digest = self.hasher.digest(image, &ctx)?;
        let key = self.trust.verify(&material, &digest)?;
        log::info!(
            "{} image ({} bytes) verified with key '{}'",
            ctx.format(),
            image.len(),
            key.name()
        );
        Ok(ImageVerification {
            format: ctx.format(),
            digest,
            key_name: key.name().to_string(),
        })
    }
}
