//! Cryptographic domain types.
//!
//! Provides the strongly typed image digest and the immutable table of
//! trusted RSA public keys. RSA arithmetic itself lives in the service layer.

mod digest_bytes;
mod trust;

pub use digest_bytes::ImageDigest;
pub use trust::{public_key_digest, TrustTable, TrustedKey};
