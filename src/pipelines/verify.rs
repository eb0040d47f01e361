//! `VerifyWorkflow`: high-level facade for verifying Apple-signed EFI binaries.
//!
//! Delegates single images to `VerificationService` and fat containers to the
//! slot walker.

use crate::{
    domain::{
        crypto::{ImageDigest, TrustTable},
        verification::{VerificationOutcome, VisitedDigest},
    },
    services::{
        fat_walker::{walk_slots, FatBinaryWalker},
        pe_hasher::PeHasher,
        verification::VerificationService,
    },
    VerifyResult,
};

/// Orchestrates verification of a fat or single EFI binary against one trust table.
pub struct VerifyWorkflow<'t> {
    svc: VerificationService<'t>,
}

impl<'t> VerifyWorkflow<'t> {
    #[must_use]
    pub fn new(table: &'t TrustTable) -> Self {
        Self {
            svc: VerificationService::new(table),
        }
    }

    /// Run verification over the binary bytes.
    pub fn run(&self, binary: &[u8]) -> VerificationOutcome {
        log::debug!("Verifying {} byte binary", binary.len());
        FatBinaryWalker::new(&self.svc).walk(binary)
    }
}

/// Digest every verifiable image in `binary` without checking signatures.
pub fn digests(binary: &[u8]) -> VerifyResult<Vec<VisitedDigest>> {
    let hasher = PeHasher::new();
    let (_, slots) = walk_slots(binary, |image| hasher.hash(image))?;
    Ok(slots
        .into_iter()
        .filter_map(|slot| {
            slot.value.map(|digest: ImageDigest| VisitedDigest {
                index: slot.index,
                cpu_type: slot.cpu_type,
                offset: slot.offset,
                digest,
            })
        })
        .collect())
}
