//! Apple EFI Verifier Library
//!
//! Structural validation and signature verification of Apple-signed EFI
//! binaries: single PE32/PE32+ images and Apple "fat" containers holding one
//! image per CPU architecture.
//!
//! Layers:
//! - `domain`: header layouts, fat container, signature material, trust table
//! - `services`: digest engine, trust verifier, fat-binary walker
//! - `pipelines`: the verify workflow used by the entry points below
//! - `infra`: errors and configuration

pub mod domain;
pub mod infra;
pub mod pipelines;
pub mod services;

pub use infra::{config, error};

use std::path::Path;

pub use domain::crypto::{public_key_digest, ImageDigest, TrustTable, TrustedKey};
pub use domain::pe::{ImageContext, ImageFormat};
pub use domain::verification::{
    ContainerKind, ImageVerification, SlotOutcome, SlotReport, VerificationOutcome,
    VerificationReport, VisitedDigest,
};
pub use infra::error::{VerifyError, VerifyResult};
pub use pipelines::verify::VerifyWorkflow;

/// Verify a single or fat EFI binary against the process-wide trust table.
///
/// Until [`TrustTable::install_global`] runs the table is empty and every
/// signed image fails with [`VerifyError::UnknownPublicKey`].
pub fn verify_image_signature(binary: &[u8]) -> VerificationOutcome {
    verify_image_signature_with(binary, TrustTable::global())
}

/// Verify a single or fat EFI binary against an explicit trust table.
pub fn verify_image_signature_with(binary: &[u8], table: &TrustTable) -> VerificationOutcome {
    VerifyWorkflow::new(table).run(binary)
}

/// Read `path` and verify its contents.
pub fn verify_file<P: AsRef<Path>>(path: P, table: &TrustTable) -> VerificationOutcome {
    let path = path.as_ref();
    let binary = std::fs::read(path)
        .map_err(|e| VerifyError::IoError(format!("Failed to read {}: {e}", path.display())))?;
    log::info!("Verifying {}", path.display());
    verify_image_signature_with(&binary, table)
}

/// Digest of a single PE image, as covered by its Apple signature.
pub fn compute_image_digest(image: &[u8]) -> VerifyResult<ImageDigest> {
    services::pe_hasher::PeHasher::new().hash(image)
}

/// Digest of every verifiable image in a single or fat binary.
pub fn image_digests(binary: &[u8]) -> VerifyResult<Vec<VisitedDigest>> {
    pipelines::verify::digests(binary)
}

/// Parsed header summary of a single PE image.
pub fn inspect_image(image: &[u8]) -> VerifyResult<ImageContext> {
    domain::pe::parse_image(image)
}
