//! PKCS#8 private keys (`PRIVATE KEY` / `ENCRYPTED PRIVATE KEY`), read-only

use const_oid::db::{rfc5912, rfc8410};
use pkcs8::der::asn1::OctetStringRef;
use pkcs8::der::Decode;
use pkcs8::{DecodePrivateKey, EncryptedPrivateKeyInfo, PrivateKeyInfo};
use tracing::{debug, instrument};
use zeroize::Zeroizing;

use super::{pem, KeyFormat, PrivateKeyFile};
use crate::keys::{CryptoBackend, EcdsaCurve, KeyPair};
use crate::{Error, Result};

pub const PEM_LABEL: &str = "PRIVATE KEY";
pub const ENCRYPTED_PEM_LABEL: &str = "ENCRYPTED PRIVATE KEY";
pub const TYPE_LABEL: &str = "PKCS#8";

/// A PKCS#8 document as read from PEM
#[derive(Debug, Clone)]
pub struct Pkcs8KeyFile {
    bytes: Vec<u8>,
    der: Zeroizing<Vec<u8>>,
    encrypted: bool,
}

impl Pkcs8KeyFile {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let (der, encrypted) = if pem::has_label(bytes, ENCRYPTED_PEM_LABEL) {
            (pem::decode(bytes, ENCRYPTED_PEM_LABEL)?, true)
        } else {
            (pem::decode(bytes, PEM_LABEL)?, false)
        };
        debug!(encrypted, len = der.len(), "parsed PKCS#8 document");
        Ok(Self {
            bytes: bytes.to_vec(),
            der: Zeroizing::new(der),
            encrypted,
        })
    }

    #[instrument(skip_all, fields(encrypted = self.encrypted))]
    fn decrypt(&self, backend: &CryptoBackend, passphrase: Option<&str>) -> Result<KeyPair> {
        if !self.encrypted {
            return key_pair_from_der(backend, &self.der);
        }
        let passphrase = passphrase
            .filter(|p| !p.is_empty())
            .ok_or(Error::InvalidPassphrase)?;
        let info = EncryptedPrivateKeyInfo::try_from(self.der.as_slice())
            .map_err(|e| Error::malformed(format!("invalid EncryptedPrivateKeyInfo: {e}")))?;
        let document = info
            .decrypt(passphrase)
            .map_err(|_| Error::InvalidPassphrase)?;
        // CBC padding can check out by chance under a wrong key
        key_pair_from_der(backend, document.as_bytes()).map_err(|err| match err {
            Error::MalformedKey { .. } => Error::InvalidPassphrase,
            other => other,
        })
    }
}

fn key_pair_from_der(backend: &CryptoBackend, der: &[u8]) -> Result<KeyPair> {
    let info = PrivateKeyInfo::try_from(der)
        .map_err(|e| Error::malformed(format!("invalid PrivateKeyInfo: {e}")))?;
    let oid = info.algorithm.oid;

    if oid == rfc8410::ID_ED_25519 {
        let seed = OctetStringRef::from_der(info.private_key)
            .map_err(|e| Error::malformed(format!("invalid Ed25519 private key: {e}")))?;
        let seed: [u8; 32] = seed
            .as_bytes()
            .try_into()
            .map_err(|_| Error::malformed("Ed25519 seed must be 32 bytes"))?;
        KeyPair::from_ed25519_seed(backend, Zeroizing::new(seed))
    } else if oid == rfc5912::ID_EC_PUBLIC_KEY {
        let curve_oid = info
            .algorithm
            .parameters_oid()
            .map_err(|_| Error::malformed("EC key without a named curve"))?;
        let (curve, scalar) = if curve_oid == rfc5912::SECP_256_R_1 {
            let key = p256::SecretKey::from_pkcs8_der(der).map_err(malformed_ec)?;
            (EcdsaCurve::NistP256, Zeroizing::new(key.to_bytes().to_vec()))
        } else if curve_oid == rfc5912::SECP_384_R_1 {
            let key = p384::SecretKey::from_pkcs8_der(der).map_err(malformed_ec)?;
            (EcdsaCurve::NistP384, Zeroizing::new(key.to_bytes().to_vec()))
        } else if curve_oid == rfc5912::SECP_521_R_1 {
            let key = p521::SecretKey::from_pkcs8_der(der).map_err(malformed_ec)?;
            (EcdsaCurve::NistP521, Zeroizing::new(key.to_bytes().to_vec()))
        } else {
            return Err(Error::UnsupportedCurve(curve_oid.to_string()));
        };
        KeyPair::from_ecdsa_scalar(backend, curve, &scalar)
    } else if oid == rfc5912::RSA_ENCRYPTION {
        let key = rsa::RsaPrivateKey::from_pkcs8_der(der)
            .map_err(|e| Error::malformed(format!("invalid RSA private key: {e}")))?;
        KeyPair::from_rsa(key)
    } else {
        Err(Error::UnsupportedAlgorithm(format!("PKCS#8 algorithm {oid}")))
    }
}

fn malformed_ec(err: pkcs8::Error) -> Error {
    Error::malformed(format!("invalid EC private key: {err}"))
}

impl PrivateKeyFile for Pkcs8KeyFile {
    fn type_label(&self) -> &'static str {
        TYPE_LABEL
    }

    fn is_protected(&self) -> bool {
        self.encrypted
    }

    fn to_key_pair(&self, backend: &CryptoBackend, passphrase: Option<&str>) -> Result<KeyPair> {
        self.decrypt(backend, passphrase)
    }

    fn supports_passphrase_change(&self) -> bool {
        false
    }

    fn change_passphrase(
        &mut self,
        _backend: &CryptoBackend,
        _old: Option<&str>,
        _new: Option<&str>,
    ) -> Result<()> {
        Err(Error::ReadOnlyFormat(TYPE_LABEL.into()))
    }

    fn formatted_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    fn comment(&self) -> Option<&str> {
        None
    }
}

/// Registry entry for PKCS#8 documents
#[derive(Debug, Default, Clone, Copy)]
pub struct Pkcs8Format;

impl KeyFormat for Pkcs8Format {
    fn label(&self) -> &'static str {
        TYPE_LABEL
    }

    fn recognizes(&self, bytes: &[u8]) -> bool {
        pem::has_label(bytes, PEM_LABEL) || pem::has_label(bytes, ENCRYPTED_PEM_LABEL)
    }

    fn parse(&self, _backend: &CryptoBackend, bytes: &[u8]) -> Result<Box<dyn PrivateKeyFile>> {
        Ok(Box::new(Pkcs8KeyFile::parse(bytes)?))
    }
}
