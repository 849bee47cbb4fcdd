//! # sshkey-core
//!
//! Public-key core of an SSH stack: wire codec, public key algorithms,
//! OpenSSH certificates and private key containers.
//!
//! Everything here works on byte slices. Reading and writing files is left
//! to the caller (the `sshkey` binary is one such caller).
//!
//! ```no_run
//! use sshkey_core::{CryptoBackend, PublicKey, SshPublicKey};
//!
//! # fn run(line: &str, signature: &[u8]) -> sshkey_core::Result<()> {
//! let backend = CryptoBackend::default();
//! let key = PublicKey::from_openssh(&backend, line)?;
//! println!("{}", key.fingerprint());
//! if key.verify(&backend, signature, b"message")? {
//!     println!("valid");
//! }
//! # Ok(())
//! # }
//! ```

pub mod cert;
pub mod cli;
pub mod config;
pub mod encoding;
pub mod formats;
pub mod keys;

pub use cert::{Certificate, CertificateBuilder, CertificateType};
pub use config::Config;
pub use formats::{FormatRegistry, PrivateKeyFile};
pub use keys::{
    CryptoBackend, EcdsaCurve, KeyAlgorithm, KeyPair, PublicKey, SecurityLevel, SshPublicKey,
};

/// Result type alias for sshkey-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for sshkey-core operations
///
/// A signature that simply does not verify is not an error: `verify`
/// returns `Ok(false)` for it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A declared length ran past the end of the input
    #[error("Truncated input: needed {needed} bytes, {remaining} remaining")]
    TruncatedInput { needed: usize, remaining: usize },

    /// Structurally invalid key, certificate or container
    #[error("Malformed key: {reason}")]
    MalformedKey {
        reason: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Container framing or encryption scheme not recognized
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Elliptic curve identifier not recognized
    #[error("Unsupported curve: {0}")]
    UnsupportedCurve(String),

    /// Key or signature algorithm name not recognized
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Decryption or integrity check failed
    #[error("Invalid passphrase")]
    InvalidPassphrase,

    /// The container format cannot be rewritten
    #[error("Format is read-only: {0}")]
    ReadOnlyFormat(String),

    /// The algorithm name embedded in a signature does not match the key
    #[error("Signature algorithm mismatch: expected {expected}, found {found}")]
    SignatureAlgorithmMismatch { expected: String, found: String },

    /// Signature bytes have the wrong shape for the algorithm
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    /// The backend policy refuses the key or signature scheme
    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    /// Failure inside a cryptographic primitive
    #[error("Cryptography error: {0}")]
    Crypto(String),

    /// Invalid base64 in a text encoding
    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl Error {
    /// Shorthand for a `MalformedKey` without an underlying cause
    pub fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedKey {
            reason: reason.into(),
            source: None,
        }
    }

    /// Shorthand for a `MalformedKey` wrapping the error that caused it
    pub fn malformed_by(reason: impl Into<String>, source: Error) -> Self {
        Error::MalformedKey {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// True when this error, or any `MalformedKey` cause chain below it,
    /// is a truncation.
    pub fn is_truncation(&self) -> bool {
        match self {
            Error::TruncatedInput { .. } => true,
            Error::MalformedKey {
                source: Some(source),
                ..
            } => source.is_truncation(),
            _ => false,
        }
    }
}

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
