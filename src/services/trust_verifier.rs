//! Trust verifier: matches the embedded public key against the trust table and
//! checks the RSA PKCS#1 v1.5 / SHA-256 signature over the image digest.

use openssl::bn::BigNum;
use openssl::rsa::{Padding, Rsa};

use crate::domain::constants::{RSA_KEY_SIZE, SHA256_DIGEST_INFO_PREFIX};
use crate::domain::crypto::{public_key_digest, ImageDigest, TrustTable, TrustedKey};
use crate::domain::signature::SignatureMaterial;
use crate::infra::error::{VerifyError, VerifyResult};

/// `DigestInfo(SHA-256, digest)`, the value a valid signature recovers to.
#[must_use]
pub fn expected_digest_info(digest: &ImageDigest) -> Vec<u8> {
    let mut out = Vec::with_capacity(SHA256_DIGEST_INFO_PREFIX.len() + digest.as_bytes().len());
    out.extend_from_slice(&SHA256_DIGEST_INFO_PREFIX);
    out.extend_from_slice(digest.as_bytes());
    out
}

pub struct TrustVerifier<'t> {
    table: &'t TrustTable,
}

impl<'t> TrustVerifier<'t> {
    #[must_use]
    pub fn new(table: &'t TrustTable) -> Self {
        Self { table }
    }

    /// Look up the trust entry for the embedded key (stored byte order).
    pub fn lookup(&self, material: &SignatureMaterial) -> VerifyResult<&'t TrustedKey> {
        let key_digest = public_key_digest(material.public_key_le());
        self.table.find(&key_digest).ok_or_else(|| {
            let digest_hex = hex::encode(key_digest);
            log::debug!(
                "Public key {digest_hex} not among {} trusted keys",
                self.table.len()
            );
            VerifyError::UnknownPublicKey(digest_hex)
        })
    }

    /// Verify `material` against `digest`; returns the trust entry that validated it.
    pub fn verify(
        &self,
        material: &SignatureMaterial,
        digest: &ImageDigest,
    ) -> VerifyResult<&'t TrustedKey> {
        let key = self.lookup(material)?;
        log::debug!("Public key matches trusted key '{}'", key.name());
        verify_rsa_signature(key, material.signature_be(), digest)?;
        Ok(key)
    }
}

/// Raise the big-endian signature to the key's exponent and compare the
/// recovered PKCS#1 v1.5 payload with `DigestInfo(SHA-256, digest)`.
pub fn verify_rsa_signature(
    key: &TrustedKey,
    signature_be: &[u8; RSA_KEY_SIZE],
    digest: &ImageDigest,
) -> VerifyResult<()> {
    let n = BigNum::from_slice(key.modulus_be())?;
    let e = BigNum::from_u32(key.exponent())?;
    let rsa = Rsa::from_public_components(n, e)?;

    let mut recovered = vec![0u8; rsa.size() as usize];
    let len = match rsa.public_decrypt(signature_be, &mut recovered, Padding::PKCS1) {
        Ok(len) => len,
        Err(err) => {
            log::debug!("RSA recovery failed: {err}");
            return Err(VerifyError::SignatureMismatch(
                "signature does not decode under the trusted key".into(),
            ));
        }
    };

    let expected = expected_digest_info(digest);
    if len != expected.len() || !openssl::memcmp::eq(&recovered[..len], &expected) {
        log::debug!("Recovered digest info does not match image digest {digest}");
        return Err(VerifyError::SignatureMismatch(format!(
            "signature does not cover image digest {digest}"
        )));
    }
    Ok(())
}
