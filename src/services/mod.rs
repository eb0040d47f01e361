//! Service layer module root.
//! Contains the digest engine, trust verification and the fat-binary walker.

pub mod fat_walker;
pub mod pe_hasher;
pub mod trust_verifier;
pub mod verification;

pub use fat_walker::FatBinaryWalker;
pub use pe_hasher::PeHasher;
pub use trust_verifier::{expected_digest_info, verify_rsa_signature, TrustVerifier};
pub use verification::{ImageVerifier, VerificationService};
