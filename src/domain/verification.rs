//! Verification domain types for Apple EFI images.
//!
//! A successful verification returns a [`VerificationReport`]; any failure is a
//! single [`crate::VerifyError`]. There is no partially verified state: a
//! report exists only if every verifiable image in the buffer passed.

use crate::domain::crypto::ImageDigest;
use crate::domain::pe::ImageFormat;
use crate::infra::error::VerifyResult;

/// Outcome of one top-level verification call.
pub type VerificationOutcome = VerifyResult<VerificationReport>;

/// Result of verifying a single PE image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageVerification {
    pub format: ImageFormat,
    pub digest: ImageDigest,
    /// Name of the trust table entry whose key validated the signature
    pub key_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOutcome {
    Verified(ImageVerification),
    /// CPU type other than x86/x86_64; accounted for but not verified
    Skipped,
}

/// One image inside the buffer: the whole buffer for a bare image, or one
/// architecture slot of a fat container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotReport {
    pub index: usize,
    /// `None` for bare images
    pub cpu_type: Option<u32>,
    pub offset: u64,
    pub size: u64,
    pub outcome: SlotOutcome,
}

/// Digest of one verifiable image, computed without a signature check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitedDigest {
    pub index: usize,
    pub cpu_type: Option<u32>,
    pub offset: u64,
    pub digest: ImageDigest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Single,
    Fat { arch_count: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub container: ContainerKind,
    pub slots: Vec<SlotReport>,
}

impl VerificationReport {
    /// Images whose signatures were checked.
    pub fn verified(&self) -> impl Iterator<Item = &ImageVerification> {
        self.slots.iter().filter_map(|slot| match &slot.outcome {
            SlotOutcome::Verified(image) => Some(image),
            SlotOutcome::Skipped => None,
        })
    }

    #[must_use]
    pub fn verified_count(&self) -> usize {
        self.verified().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_only_verified_slots() {
        let image = ImageVerification {
            format: ImageFormat::Pe32Plus,
            digest: ImageDigest::new([1; 32]),
            key_name: "test".into(),
        };
        let report = VerificationReport {
            container: ContainerKind::Fat { arch_count: 2 },
            slots: vec![
                SlotReport {
                    index: 0,
                    cpu_type: Some(12),
                    offset: 48,
                    size: 10,
                    outcome: SlotOutcome::Skipped,
                },
                SlotReport {
                    index: 1,
                    cpu_type: Some(7),
                    offset: 58,
                    size: 10,
                    outcome: SlotOutcome::Verified(image.clone()),
                },
            ],
        };
        assert_eq!(report.verified_count(), 1);
        assert_eq!(report.verified().next(), Some(&image));
    }
}
