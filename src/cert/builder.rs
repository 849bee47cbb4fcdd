use tracing::info;

use super::{Certificate, CertificateOption, CertificateType};
use crate::encoding::Writer;
use crate::keys::{CryptoBackend, KeyPair, PublicKey, SshPublicKey};
use crate::{Error, Result};

const NONCE_LEN: usize = 32;

/// Assembles and signs a certificate for a base key
///
/// ```no_run
/// # use sshkey_core::{CertificateBuilder, CertificateType, CryptoBackend, KeyPair, PublicKey};
/// # fn run(backend: &CryptoBackend, ca: &KeyPair, user: PublicKey) -> sshkey_core::Result<()> {
/// let cert = CertificateBuilder::new(user)?
///     .cert_type(CertificateType::User)
///     .key_id("alice@example.com")
///     .principal("alice")
///     .valid_between(1_700_000_000, 1_800_000_000)
///     .extension("permit-pty")
///     .sign(backend, ca)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CertificateBuilder {
    key: PublicKey,
    serial: u64,
    cert_type: CertificateType,
    key_id: String,
    principals: Vec<String>,
    valid_after: u64,
    valid_before: u64,
    critical_options: Vec<CertificateOption>,
    extensions: Vec<CertificateOption>,
}

impl CertificateBuilder {
    /// Start a user certificate valid forever for any principal
    pub fn new(key: PublicKey) -> Result<Self> {
        if key.is_certificate() {
            return Err(Error::malformed("cannot certify a certificate"));
        }
        Ok(Self {
            key,
            serial: 0,
            cert_type: CertificateType::User,
            key_id: String::new(),
            principals: Vec::new(),
            valid_after: 0,
            valid_before: u64::MAX,
            critical_options: Vec::new(),
            extensions: Vec::new(),
        })
    }

    pub fn serial(mut self, serial: u64) -> Self {
        self.serial = serial;
        self
    }

    pub fn cert_type(mut self, cert_type: CertificateType) -> Self {
        self.cert_type = cert_type;
        self
    }

    pub fn key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = key_id.into();
        self
    }

    pub fn principal(mut self, principal: impl Into<String>) -> Self {
        self.principals.push(principal.into());
        self
    }

    pub fn valid_between(mut self, after: u64, before: u64) -> Self {
        self.valid_after = after;
        self.valid_before = before;
        self
    }

    /// Add a critical option whose data is the string `value`
    pub fn critical_option(mut self, name: impl Into<String>, value: &str) -> Self {
        let mut data = Writer::new();
        data.write_string(value);
        self.critical_options.push(CertificateOption {
            name: name.into(),
            data: data.into_bytes(),
        });
        self
    }

    /// Add a flag extension with empty data
    pub fn extension(mut self, name: impl Into<String>) -> Self {
        self.extensions.push(CertificateOption {
            name: name.into(),
            data: Vec::new(),
        });
        self
    }

    /// Draw a nonce and sign with `ca`
    pub fn sign(mut self, backend: &CryptoBackend, ca: &KeyPair) -> Result<Certificate> {
        if self.valid_after > self.valid_before {
            return Err(Error::malformed("validity window ends before it starts"));
        }
        // OpenSSH expects both lists in lexical order
        self.critical_options.sort_by(|a, b| a.name.cmp(&b.name));
        self.extensions.sort_by(|a, b| a.name.cmp(&b.name));

        let mut nonce = vec![0u8; NONCE_LEN];
        backend.fill_random(&mut nonce)?;

        let mut cert = Certificate {
            nonce,
            key: self.key,
            serial: self.serial,
            cert_type: self.cert_type,
            key_id: self.key_id,
            principals: self.principals,
            valid_after: self.valid_after,
            valid_before: self.valid_before,
            critical_options: self.critical_options,
            extensions: self.extensions,
            reserved: Vec::new(),
            signature_key: ca.public_key().clone(),
            signature: Vec::new(),
            signed: Vec::new(),
        };
        cert.signed = cert.encode_signed();
        cert.signature = ca.sign(backend, &cert.signed)?;

        info!(
            key_id = %cert.key_id,
            serial = cert.serial,
            ca = %ca.public_key().fingerprint(),
            "issued certificate"
        );
        Ok(cert)
    }
}
