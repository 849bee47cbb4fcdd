//! `ssh-dss` public keys
//!
//! Only the FIPS 186-2 shape OpenSSH uses is accepted: a 160-bit `q`, and
//! signatures of exactly 40 bytes (`r || s`, 20 bytes each).

use super::algorithm::KeyAlgorithm;
use super::backend::CryptoBackend;
use super::public::SshPublicKey;
use super::signature::SignatureBlob;
use crate::encoding::{Mpint, Reader, Writer};
use crate::{Error, Result};

pub(crate) const SIGNATURE_HALF: usize = 20;

/// DSA public key: domain parameters and public value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DsaPublicKey {
    p: Mpint,
    q: Mpint,
    g: Mpint,
    y: Mpint,
}

impl DsaPublicKey {
    pub fn new(backend: &CryptoBackend, p: Mpint, q: Mpint, g: Mpint, y: Mpint) -> Result<Self> {
        if q.bit_length() != SIGNATURE_HALF * 8 {
            return Err(Error::malformed(format!(
                "DSA subgroup order must be 160 bits, got {}",
                q.bit_length()
            )));
        }
        let key = Self { p, q, g, y };
        key.verifying_key(backend)?;
        Ok(key)
    }

    pub fn p(&self) -> &Mpint {
        &self.p
    }

    pub fn q(&self) -> &Mpint {
        &self.q
    }

    pub fn g(&self) -> &Mpint {
        &self.g
    }

    pub fn y(&self) -> &Mpint {
        &self.y
    }

    /// `mpint p, mpint q, mpint g, mpint y`
    pub(crate) fn decode_fields(backend: &CryptoBackend, reader: &mut Reader<'_>) -> Result<Self> {
        let p = reader.read_mpint()?;
        let q = reader.read_mpint()?;
        let g = reader.read_mpint()?;
        let y = reader.read_mpint()?;
        Self::new(backend, p, q, g, y)
    }

    pub(crate) fn verifying_key(&self, backend: &CryptoBackend) -> Result<dsa::VerifyingKey> {
        backend.dsa_verifying_key(
            self.p.as_positive_bytes()?,
            self.q.as_positive_bytes()?,
            self.g.as_positive_bytes()?,
            self.y.as_positive_bytes()?,
        )
    }
}

impl SshPublicKey for DsaPublicKey {
    fn algorithm(&self) -> KeyAlgorithm {
        KeyAlgorithm::Dsa
    }

    fn encode_fields(&self, writer: &mut Writer) {
        writer
            .write_mpint(&self.p)
            .write_mpint(&self.q)
            .write_mpint(&self.g)
            .write_mpint(&self.y);
    }

    fn bit_length(&self) -> usize {
        self.p.bit_length()
    }

    fn verify_blob(
        &self,
        backend: &CryptoBackend,
        signature: &SignatureBlob<'_>,
        message: &[u8],
    ) -> Result<bool> {
        backend.check_key(KeyAlgorithm::Dsa, self.bit_length(), self.security_level())?;
        signature.check_algorithm(&[KeyAlgorithm::Dsa.name()])?;

        if signature.raw.len() != 2 * SIGNATURE_HALF {
            return Err(Error::MalformedSignature(format!(
                "DSA signature must be {} bytes, got {}",
                2 * SIGNATURE_HALF,
                signature.raw.len()
            )));
        }
        let (r, s) = signature.raw.split_at(SIGNATURE_HALF);
        let key = self.verifying_key(backend)?;
        backend.verify_dsa(&key, r, s, message)
    }
}
