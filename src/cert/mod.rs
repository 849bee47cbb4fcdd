//! OpenSSH certificates (`*-cert-v01@openssh.com`)
//!
//! A certificate is a base public key plus metadata, signed by a CA key.
//! It can stand in anywhere a public key is expected: verifying through a
//! certificate checks the signature against the base key. The CA signature
//! is only checked when [`Certificate::verify_ca_signature`] is called.

mod builder;

use std::fmt;

use tracing::{debug, trace};

use crate::encoding::{Reader, Writer};
use crate::keys::{
    CryptoBackend, KeyAlgorithm, PublicKey, SecurityLevel, SignatureBlob, SshPublicKey,
};
use crate::{Error, Result};

pub use builder::CertificateBuilder;

/// Whether a certificate identifies a user or a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertificateType {
    User = 1,
    Host = 2,
}

impl CertificateType {
    fn from_wire(value: u32) -> Result<Self> {
        match value {
            1 => Ok(Self::User),
            2 => Ok(Self::Host),
            other => Err(Error::malformed(format!("unknown certificate type {other}"))),
        }
    }
}

impl fmt::Display for CertificateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Host => f.write_str("host"),
        }
    }
}

/// One critical option or extension: a name and its raw data
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CertificateOption {
    pub name: String,
    pub data: Vec<u8>,
}

impl CertificateOption {
    /// The data read as a single string, which is how OpenSSH encodes
    /// option values. `None` for flag style entries with empty data.
    pub fn value(&self) -> Option<&str> {
        let mut reader = Reader::new(&self.data);
        let value = reader.read_string().ok()?;
        reader.finish().ok()?;
        Some(value)
    }
}

/// An OpenSSH certificate over a base public key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Certificate {
    nonce: Vec<u8>,
    key: PublicKey,
    serial: u64,
    cert_type: CertificateType,
    key_id: String,
    principals: Vec<String>,
    valid_after: u64,
    valid_before: u64,
    critical_options: Vec<CertificateOption>,
    extensions: Vec<CertificateOption>,
    reserved: Vec<u8>,
    signature_key: PublicKey,
    signature: Vec<u8>,
    /// Name and body exactly as the CA signed them
    signed: Vec<u8>,
}

impl Certificate {
    /// Decode the rest of a certificate whose name has already been read
    /// from `reader`. Bytes after the signature field are dropped.
    ///
    /// Every failure except an unknown curve comes back as `MalformedKey`
    /// with the underlying error attached.
    pub(crate) fn decode_after_name(
        backend: &CryptoBackend,
        reader: &mut Reader<'_>,
        algorithm: KeyAlgorithm,
    ) -> Result<Self> {
        Self::decode_body(backend, reader, algorithm).map_err(|err| match err {
            Error::UnsupportedCurve(_) => err,
            other => Error::malformed_by(
                format!("invalid {} certificate", algorithm.certificate_name()),
                other,
            ),
        })
    }

    fn decode_body(
        backend: &CryptoBackend,
        reader: &mut Reader<'_>,
        algorithm: KeyAlgorithm,
    ) -> Result<Self> {
        let body_start = reader.position();

        let nonce = reader.read_binary_string()?.to_vec();
        let key = PublicKey::decode_fields(backend, reader, algorithm)?;
        let serial = reader.read_u64()?;
        let cert_type = CertificateType::from_wire(reader.read_u32()?)?;
        let key_id = reader.read_string()?.to_string();
        let principals = read_principals(reader.read_binary_string()?)?;
        let valid_after = reader.read_u64()?;
        let valid_before = reader.read_u64()?;
        let critical_options = read_options(reader.read_binary_string()?)?;
        let extensions = read_options(reader.read_binary_string()?)?;
        let reserved = reader.read_binary_string()?.to_vec();

        let signature_key = PublicKey::from_blob(backend, reader.read_binary_string()?)?;
        if signature_key.is_certificate() {
            return Err(Error::malformed("CA key is itself a certificate"));
        }
        let signed_end = reader.position();
        let signature = reader.read_binary_string()?.to_vec();

        if !reader.is_empty() {
            trace!(
                trailing = reader.remaining(),
                "ignoring bytes after certificate signature"
            );
            reader.read_raw(reader.remaining())?;
        }

        // Curve aliases and padded mpints do not survive re-encoding
        let mut signed = Writer::with_capacity(signed_end - body_start + 64);
        signed
            .write_string(algorithm.certificate_name())
            .write_raw(&reader.consumed()[body_start..signed_end]);

        let cert = Self {
            nonce,
            key,
            serial,
            cert_type,
            key_id,
            principals,
            valid_after,
            valid_before,
            critical_options,
            extensions,
            reserved,
            signature_key,
            signature,
            signed: signed.into_bytes(),
        };

        debug!(
            key_id = %cert.key_id,
            serial = cert.serial,
            cert_type = %cert.cert_type,
            "decoded certificate"
        );
        Ok(cert)
    }

    /// Every blob byte up to, but not including, the signature field
    pub fn signed_bytes(&self) -> &[u8] {
        &self.signed
    }

    /// Canonical encoding of the name and body from the parsed fields
    fn encode_signed(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        writer
            .write_string(self.algorithm_name())
            .write_binary_string(&self.nonce);
        self.key.encode_fields(&mut writer);
        writer
            .write_u64(self.serial)
            .write_u32(self.cert_type as u32)
            .write_string(&self.key_id)
            .write_binary_string(&write_principals(&self.principals))
            .write_u64(self.valid_after)
            .write_u64(self.valid_before)
            .write_binary_string(&write_options(&self.critical_options))
            .write_binary_string(&write_options(&self.extensions))
            .write_binary_string(&self.reserved)
            .write_binary_string(&self.signature_key.to_blob());
        writer.into_bytes()
    }

    /// Check the CA signature over the certificate.
    ///
    /// This is the mechanism only; whether to trust the CA, and whether the
    /// validity window or principals are acceptable, is up to the caller.
    pub fn verify_ca_signature(&self, backend: &CryptoBackend) -> Result<bool> {
        self.signature_key
            .verify(backend, &self.signature, &self.signed)
    }

    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    /// The key this certificate vouches for
    pub fn base_key(&self) -> &PublicKey {
        &self.key
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn cert_type(&self) -> CertificateType {
        self.cert_type
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn principals(&self) -> &[String] {
        &self.principals
    }

    pub fn valid_after(&self) -> u64 {
        self.valid_after
    }

    pub fn valid_before(&self) -> u64 {
        self.valid_before
    }

    pub fn critical_options(&self) -> &[CertificateOption] {
        &self.critical_options
    }

    pub fn extensions(&self) -> &[CertificateOption] {
        &self.extensions
    }

    pub fn reserved(&self) -> &[u8] {
        &self.reserved
    }

    /// The CA public key
    pub fn signature_key(&self) -> &PublicKey {
        &self.signature_key
    }

    /// The CA signature blob
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// `valid_after <= now < valid_before`, in seconds since the epoch
    pub fn is_valid_at(&self, now: u64) -> bool {
        self.valid_after <= now && now < self.valid_before
    }

    /// An empty principal list matches every name
    pub fn is_valid_for_principal(&self, name: &str) -> bool {
        self.principals.is_empty() || self.principals.iter().any(|p| p == name)
    }

    pub fn critical_option(&self, name: &str) -> Option<&CertificateOption> {
        self.critical_options.iter().find(|o| o.name == name)
    }

    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions.iter().any(|e| e.name == name)
    }
}

impl SshPublicKey for Certificate {
    fn algorithm(&self) -> KeyAlgorithm {
        self.key.algorithm()
    }

    fn algorithm_name(&self) -> &'static str {
        self.key.algorithm().certificate_name()
    }

    fn encode_fields(&self, writer: &mut Writer) {
        let name_len = 4 + self.algorithm_name().len();
        writer
            .write_raw(&self.signed[name_len..])
            .write_binary_string(&self.signature);
    }

    fn bit_length(&self) -> usize {
        self.key.bit_length()
    }

    fn security_level(&self) -> SecurityLevel {
        self.key.security_level()
    }

    /// Verify against the base key. A signature may carry either the base
    /// algorithm name or the certificate name.
    fn verify_blob(
        &self,
        backend: &CryptoBackend,
        signature: &SignatureBlob<'_>,
        message: &[u8],
    ) -> Result<bool> {
        let algorithm = match signature.algorithm {
            Some(name) if name == self.algorithm_name().as_bytes() => {
                Some(self.key.algorithm_name().as_bytes())
            }
            other => other,
        };
        let normalized = SignatureBlob {
            algorithm,
            raw: signature.raw,
        };
        self.key.verify_blob(backend, &normalized, message)
    }
}

fn read_principals(packed: &[u8]) -> Result<Vec<String>> {
    let mut reader = Reader::new(packed);
    let mut principals = Vec::new();
    while !reader.is_empty() {
        principals.push(reader.read_string()?.to_string());
    }
    Ok(principals)
}

fn write_principals(principals: &[String]) -> Vec<u8> {
    let mut writer = Writer::new();
    for principal in principals {
        writer.write_string(principal);
    }
    writer.into_bytes()
}

fn read_options(packed: &[u8]) -> Result<Vec<CertificateOption>> {
    let mut reader = Reader::new(packed);
    let mut options = Vec::new();
    while !reader.is_empty() {
        let name = reader.read_string()?.to_string();
        let data = reader.read_binary_string()?.to_vec();
        options.push(CertificateOption { name, data });
    }
    Ok(options)
}

fn write_options(options: &[CertificateOption]) -> Vec<u8> {
    let mut writer = Writer::new();
    for option in options {
        writer
            .write_string(&option.name)
            .write_binary_string(&option.data);
    }
    writer.into_bytes()
}
