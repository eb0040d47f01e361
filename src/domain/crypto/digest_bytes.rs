use std::fmt;

use crate::domain::constants::SHA256_DIGEST_SIZE;

/// SHA-256 digest of an image under the Apple Authenticode-like byte selection.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct ImageDigest([u8; SHA256_DIGEST_SIZE]);

impl ImageDigest {
    #[must_use]
    pub fn new(bytes: [u8; SHA256_DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; SHA256_DIGEST_SIZE] {
        &self.0
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ImageDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageDigest({})", self.to_hex())
    }
}

impl fmt::Display for ImageDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
