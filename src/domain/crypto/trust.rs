//! Trusted public key table.
//!
//! Entries are keyed by the SHA-256 of the modulus exactly as it is stored in
//! signed images (little-endian). The table is immutable once built; a single
//! process-wide instance can be installed once and shared by every verification.

use std::fmt;
use std::sync::OnceLock;

use sha2::{Digest, Sha256};

use crate::domain::constants::{RSA_KEY_SIZE, SHA256_DIGEST_SIZE};
use crate::domain::signature::reversed;
use crate::infra::error::{VerifyError, VerifyResult};

/// SHA-256 of a stored (little-endian) public key modulus.
#[must_use]
pub fn public_key_digest(public_key_le: &[u8; RSA_KEY_SIZE]) -> [u8; SHA256_DIGEST_SIZE] {
    Sha256::digest(public_key_le).into()
}

/// One trusted RSA-2048 public key.
#[derive(Clone, PartialEq, Eq)]
pub struct TrustedKey {
    name: String,
    key_digest: [u8; SHA256_DIGEST_SIZE],
    modulus_be: [u8; RSA_KEY_SIZE],
    exponent: u32,
}

impl TrustedKey {
    /// Build from a modulus in the little-endian order used inside images.
    pub fn from_le_modulus(name: impl Into<String>, modulus: &[u8], exponent: u32) -> VerifyResult<Self> {
        let modulus_le = Self::modulus_array(modulus)?;
        Ok(Self {
            name: name.into(),
            key_digest: public_key_digest(&modulus_le),
            modulus_be: reversed(&modulus_le),
            exponent: Self::checked_exponent(exponent)?,
        })
    }

    /// Build from a big-endian modulus (the order OpenSSL and PEM tooling emit).
    pub fn from_be_modulus(name: impl Into<String>, modulus: &[u8], exponent: u32) -> VerifyResult<Self> {
        let modulus_be = Self::modulus_array(modulus)?;
        Ok(Self {
            name: name.into(),
            key_digest: public_key_digest(&reversed(&modulus_be)),
            modulus_be,
            exponent: Self::checked_exponent(exponent)?,
        })
    }

    fn modulus_array(modulus: &[u8]) -> VerifyResult<[u8; RSA_KEY_SIZE]> {
        modulus.try_into().map_err(|_| {
            VerifyError::ConfigurationError(format!(
                "RSA modulus must be {RSA_KEY_SIZE} bytes, got {}",
                modulus.len()
            ))
        })
    }

    fn checked_exponent(exponent: u32) -> VerifyResult<u32> {
        if exponent < 3 || exponent % 2 == 0 {
            return Err(VerifyError::ConfigurationError(format!(
                "invalid RSA public exponent {exponent}"
            )));
        }
        Ok(exponent)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
    #[must_use]
    pub fn key_digest(&self) -> &[u8; SHA256_DIGEST_SIZE] {
        &self.key_digest
    }
    #[must_use]
    pub fn modulus_be(&self) -> &[u8; RSA_KEY_SIZE] {
        &self.modulus_be
    }
    #[must_use]
    pub fn exponent(&self) -> u32 {
        self.exponent
    }
}

impl fmt::Debug for TrustedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TrustedKey(name={}, digest={}, e={})",
            self.name,
            hex::encode(self.key_digest),
            self.exponent
        )
    }
}

/// Immutable set of trusted keys.
#[derive(Clone, Debug, Default)]
pub struct TrustTable {
    entries: Vec<TrustedKey>,
}

static GLOBAL_TRUST_TABLE: OnceLock<TrustTable> = OnceLock::new();

impl TrustTable {
    #[must_use]
    pub fn new(entries: Vec<TrustedKey>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[TrustedKey] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry whose key digest equals `digest`.
    #[must_use]
    pub fn find(&self, digest: &[u8; SHA256_DIGEST_SIZE]) -> Option<&TrustedKey> {
        self.entries.iter().find(|entry| &entry.key_digest == digest)
    }

    /// Install the process-wide table. Fails if one is already installed.
    pub fn install_global(table: TrustTable) -> VerifyResult<&'static TrustTable> {
        let count = table.len();
        GLOBAL_TRUST_TABLE.set(table).map_err(|_| {
            VerifyError::ConfigurationError("global trust table is already installed".into())
        })?;
        log::debug!("Installed global trust table with {count} keys");
        Ok(Self::global())
    }

    /// The process-wide table; empty until [`TrustTable::install_global`] runs.
    #[must_use]
    pub fn global() -> &'static TrustTable {
        GLOBAL_TRUST_TABLE.get_or_init(TrustTable::default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modulus(seed: u8) -> Vec<u8> {
        (0..RSA_KEY_SIZE).map(|i| seed.wrapping_add(i as u8)).collect()
    }

    #[test]
    fn byte_orders_produce_the_same_entry() {
        let le = modulus(7);
        let be: Vec<u8> = le.iter().rev().copied().collect();
        let a = TrustedKey::from_le_modulus("a", &le, 65537).unwrap();
        let b = TrustedKey::from_be_modulus("a", &be, 65537).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.key_digest(), &public_key_digest(&le.try_into().unwrap()));
    }

    #[test]
    fn rejects_bad_modulus_and_exponent() {
        assert!(TrustedKey::from_le_modulus("short", &[0u8; 128], 65537).is_err());
        assert!(TrustedKey::from_le_modulus("even", &modulus(1), 65536).is_err());
        assert!(TrustedKey::from_le_modulus("one", &modulus(1), 1).is_err());
    }

    #[test]
    fn first_match_wins() {
        let first = TrustedKey::from_le_modulus("first", &modulus(3), 65537).unwrap();
        let second = TrustedKey::from_le_modulus("second", &modulus(3), 3).unwrap();
        let other = TrustedKey::from_le_modulus("other", &modulus(9), 65537).unwrap();
        let digest = *first.key_digest();
        let table = TrustTable::new(vec![other, first, second]);
        assert_eq!(table.find(&digest).unwrap().name(), "first");
        assert!(table.find(&[0u8; 32]).is_none());
    }
}
