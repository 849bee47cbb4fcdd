//! `ssh-rsa` public keys

use super::algorithm::{KeyAlgorithm, RsaHash, SecurityLevel};
use super::backend::CryptoBackend;
use super::public::SshPublicKey;
use super::signature::SignatureBlob;
use crate::encoding::{Mpint, Reader, Writer};
use crate::{Error, Result};

const SIGNATURE_NAMES: [&str; 3] = ["ssh-rsa", "rsa-sha2-256", "rsa-sha2-512"];

/// RSA public key: exponent and modulus
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RsaPublicKey {
    e: Mpint,
    n: Mpint,
}

impl RsaPublicKey {
    pub fn new(e: Mpint, n: Mpint) -> Result<Self> {
        if e.is_negative() || e.is_zero() {
            return Err(Error::malformed("RSA exponent must be positive"));
        }
        if n.is_negative() || n.is_zero() {
            return Err(Error::malformed("RSA modulus must be positive"));
        }
        Ok(Self { e, n })
    }

    pub fn exponent(&self) -> &Mpint {
        &self.e
    }

    pub fn modulus(&self) -> &Mpint {
        &self.n
    }

    /// `mpint e, mpint n`
    pub(crate) fn decode_fields(reader: &mut Reader<'_>) -> Result<Self> {
        let e = reader.read_mpint()?;
        let n = reader.read_mpint()?;
        Self::new(e, n)
    }
}

impl SshPublicKey for RsaPublicKey {
    fn algorithm(&self) -> KeyAlgorithm {
        KeyAlgorithm::Rsa
    }

    fn encode_fields(&self, writer: &mut Writer) {
        writer.write_mpint(&self.e).write_mpint(&self.n);
    }

    fn bit_length(&self) -> usize {
        self.n.bit_length()
    }

    fn security_level(&self) -> SecurityLevel {
        SecurityLevel::for_rsa_bits(self.bit_length())
    }

    fn verify_blob(
        &self,
        backend: &CryptoBackend,
        signature: &SignatureBlob<'_>,
        message: &[u8],
    ) -> Result<bool> {
        backend.check_key(KeyAlgorithm::Rsa, self.bit_length(), self.security_level())?;
        signature.check_algorithm(&SIGNATURE_NAMES)?;

        // The legacy layout predates the SHA-2 variants
        let hash = signature
            .algorithm_name()
            .and_then(RsaHash::from_signature_name)
            .unwrap_or(RsaHash::Sha1);

        backend.verify_rsa(
            self.n.as_positive_bytes()?,
            self.e.as_positive_bytes()?,
            hash,
            message,
            signature.raw,
        )
    }
}
