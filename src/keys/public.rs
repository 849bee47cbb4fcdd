//! The public key sum type and its shared capability trait

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::debug;

use super::algorithm::{KeyAlgorithm, SecurityLevel};
use super::backend::CryptoBackend;
use super::dsa::DsaPublicKey;
use super::ecdsa::EcdsaPublicKey;
use super::ed25519::Ed25519PublicKey;
use super::fingerprint::{fingerprint, HashAlg};
use super::rsa::RsaPublicKey;
use super::signature::SignatureBlob;
use crate::cert::Certificate;
use crate::encoding::{Reader, Writer};
use crate::{Error, Result};

/// Capabilities every public key variant offers
pub trait SshPublicKey {
    /// Base algorithm of the key material
    fn algorithm(&self) -> KeyAlgorithm;

    /// Name at the front of the encoded blob
    fn algorithm_name(&self) -> &'static str {
        self.algorithm().name()
    }

    /// Write every field that follows the algorithm name
    fn encode_fields(&self, writer: &mut Writer);

    /// Group order or modulus size in bits
    fn bit_length(&self) -> usize;

    fn security_level(&self) -> SecurityLevel {
        self.algorithm().security_level()
    }

    /// Verify an already framed signature.
    ///
    /// `Ok(false)` means the signature is well formed but wrong.
    fn verify_blob(
        &self,
        backend: &CryptoBackend,
        signature: &SignatureBlob<'_>,
        message: &[u8],
    ) -> Result<bool>;

    /// Verify a signature in either wire layout.
    fn verify(&self, backend: &CryptoBackend, signature: &[u8], message: &[u8]) -> Result<bool> {
        let blob = SignatureBlob::parse(signature)?;
        self.verify_blob(backend, &blob, message)
    }

    /// Encoded public key blob
    fn to_blob(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.write_string(self.algorithm_name());
        self.encode_fields(&mut writer);
        writer.into_bytes()
    }

    /// `SHA256:` fingerprint of the blob
    fn fingerprint(&self) -> String {
        fingerprint(&self.to_blob(), HashAlg::Sha256)
    }

    fn fingerprint_with(&self, hash: HashAlg) -> String {
        fingerprint(&self.to_blob(), hash)
    }
}

/// SSH public key of any supported algorithm, or a certificate
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    Dsa(DsaPublicKey),
    Ecdsa(EcdsaPublicKey),
    Ed25519(Ed25519PublicKey),
    Certificate(Box<Certificate>),
}

impl PublicKey {
    /// Decode a complete public key blob
    pub fn from_blob(backend: &CryptoBackend, blob: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(blob);
        let key = Self::decode(backend, &mut reader)?;
        reader.finish()?;
        Ok(key)
    }

    /// Decode a key from the reader, leaving anything after it unread
    pub fn decode(backend: &CryptoBackend, reader: &mut Reader<'_>) -> Result<Self> {
        let name = reader.read_string()?;
        let (algorithm, is_certificate) = KeyAlgorithm::from_name(name)?;
        debug!(algorithm = name, "decoding public key");

        if is_certificate {
            let cert = Certificate::decode_after_name(backend, reader, algorithm)?;
            Ok(Self::Certificate(Box::new(cert)))
        } else {
            Self::decode_fields(backend, reader, algorithm)
        }
    }

    /// Decode the fields of a plain key whose name has already been read
    pub(crate) fn decode_fields(
        backend: &CryptoBackend,
        reader: &mut Reader<'_>,
        algorithm: KeyAlgorithm,
    ) -> Result<Self> {
        match algorithm {
            KeyAlgorithm::Rsa => RsaPublicKey::decode_fields(reader).map(Self::Rsa),
            KeyAlgorithm::Dsa => DsaPublicKey::decode_fields(backend, reader).map(Self::Dsa),
            KeyAlgorithm::Ecdsa(curve) => {
                EcdsaPublicKey::decode_fields(backend, reader, curve).map(Self::Ecdsa)
            }
            KeyAlgorithm::Ed25519 => Ed25519PublicKey::decode_fields(reader).map(Self::Ed25519),
        }
    }

    /// Parse the `name base64 [comment]` form used in `.pub` files
    pub fn from_openssh(backend: &CryptoBackend, line: &str) -> Result<Self> {
        Self::from_openssh_with_comment(backend, line).map(|(key, _)| key)
    }

    /// Parse the `.pub` form, also returning the trailing comment
    pub fn from_openssh_with_comment(
        backend: &CryptoBackend,
        line: &str,
    ) -> Result<(Self, Option<String>)> {
        let mut parts = line.trim().splitn(3, char::is_whitespace);
        let (Some(name), Some(encoded)) = (parts.next(), parts.next()) else {
            return Err(Error::malformed("expected `<algorithm> <base64>`"));
        };
        let comment = parts
            .next()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let blob = BASE64.decode(encoded.trim())?;
        let key = Self::from_blob(backend, &blob)?;
        if key.algorithm_name() != name {
            return Err(Error::malformed(format!(
                "text form says {} but the blob holds {}",
                name,
                key.algorithm_name()
            )));
        }
        Ok((key, comment))
    }

    /// Render the `.pub` form without a comment
    pub fn to_openssh(&self) -> String {
        format!("{} {}", self.algorithm_name(), BASE64.encode(self.to_blob()))
    }

    /// Render the `.pub` form with a comment
    pub fn to_openssh_with_comment(&self, comment: &str) -> String {
        if comment.is_empty() {
            self.to_openssh()
        } else {
            format!("{} {}", self.to_openssh(), comment)
        }
    }

    pub fn is_certificate(&self) -> bool {
        matches!(self, Self::Certificate(_))
    }

    pub fn as_certificate(&self) -> Option<&Certificate> {
        match self {
            Self::Certificate(cert) => Some(cert),
            _ => None,
        }
    }

    /// The plain key: itself, or the base key of a certificate
    pub fn base_key(&self) -> &PublicKey {
        match self {
            Self::Certificate(cert) => cert.base_key(),
            other => other,
        }
    }

    fn inner(&self) -> &dyn SshPublicKey {
        match self {
            Self::Rsa(key) => key,
            Self::Dsa(key) => key,
            Self::Ecdsa(key) => key,
            Self::Ed25519(key) => key,
            Self::Certificate(cert) => cert.as_ref(),
        }
    }
}

impl SshPublicKey for PublicKey {
    fn algorithm(&self) -> KeyAlgorithm {
        self.inner().algorithm()
    }

    fn algorithm_name(&self) -> &'static str {
        self.inner().algorithm_name()
    }

    fn encode_fields(&self, writer: &mut Writer) {
        self.inner().encode_fields(writer)
    }

    fn bit_length(&self) -> usize {
        self.inner().bit_length()
    }

    fn security_level(&self) -> SecurityLevel {
        self.inner().security_level()
    }

    fn verify_blob(
        &self,
        backend: &CryptoBackend,
        signature: &SignatureBlob<'_>,
        message: &[u8],
    ) -> Result<bool> {
        self.inner().verify_blob(backend, signature, message)
    }
}

impl From<RsaPublicKey> for PublicKey {
    fn from(key: RsaPublicKey) -> Self {
        Self::Rsa(key)
    }
}

impl From<DsaPublicKey> for PublicKey {
    fn from(key: DsaPublicKey) -> Self {
        Self::Dsa(key)
    }
}

impl From<EcdsaPublicKey> for PublicKey {
    fn from(key: EcdsaPublicKey) -> Self {
        Self::Ecdsa(key)
    }
}

impl From<Ed25519PublicKey> for PublicKey {
    fn from(key: Ed25519PublicKey) -> Self {
        Self::Ed25519(key)
    }
}

impl From<Certificate> for PublicKey {
    fn from(cert: Certificate) -> Self {
        Self::Certificate(Box::new(cert))
    }
}
