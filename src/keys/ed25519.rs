//! `ssh-ed25519` public keys

use super::algorithm::KeyAlgorithm;
use super::backend::CryptoBackend;
use super::public::SshPublicKey;
use super::signature::SignatureBlob;
use crate::encoding::{Reader, Writer};
use crate::{Error, Result};

pub const PUBLIC_KEY_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;

/// Ed25519 public key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ed25519PublicKey {
    key: [u8; PUBLIC_KEY_LEN],
}

impl Ed25519PublicKey {
    pub fn new(key: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self { key }
    }

    pub fn from_slice(key: &[u8]) -> Result<Self> {
        let key: [u8; PUBLIC_KEY_LEN] = key.try_into().map_err(|_| {
            Error::malformed(format!(
                "Ed25519 public key must be {PUBLIC_KEY_LEN} bytes, got {}",
                key.len()
            ))
        })?;
        Ok(Self { key })
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.key
    }

    /// `string key`
    pub(crate) fn decode_fields(reader: &mut Reader<'_>) -> Result<Self> {
        Self::from_slice(reader.read_binary_string()?)
    }
}

impl SshPublicKey for Ed25519PublicKey {
    fn algorithm(&self) -> KeyAlgorithm {
        KeyAlgorithm::Ed25519
    }

    fn encode_fields(&self, writer: &mut Writer) {
        writer.write_binary_string(&self.key);
    }

    fn bit_length(&self) -> usize {
        PUBLIC_KEY_LEN * 8
    }

    fn verify_blob(
        &self,
        backend: &CryptoBackend,
        signature: &SignatureBlob<'_>,
        message: &[u8],
    ) -> Result<bool> {
        backend.check_key(KeyAlgorithm::Ed25519, self.bit_length(), self.security_level())?;
        signature.check_algorithm(&[KeyAlgorithm::Ed25519.name()])?;

        if signature.raw.len() != SIGNATURE_LEN {
            return Err(Error::MalformedSignature(format!(
                "Ed25519 signature must be {SIGNATURE_LEN} bytes, got {}",
                signature.raw.len()
            )));
        }
        Ok(backend.verify_ed25519(&self.key, message, signature.raw))
    }
}
