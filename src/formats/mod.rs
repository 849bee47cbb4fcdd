//! Private key containers
//!
//! Each supported container is a [`KeyFormat`] that recognizes its own bytes
//! and parses them into a [`PrivateKeyFile`]. The [`FormatRegistry`] tries
//! them in registration order.

pub mod openssh;
mod pem;
pub mod pkcs8;

use std::fmt;

use tracing::debug;

use crate::keys::{CryptoBackend, KeyPair};
use crate::{Error, Result};

pub use openssh::{Cipher, Kdf, OpenSshFormat, OpenSshKeyFile, OpenSshOptions};
pub use pkcs8::{Pkcs8Format, Pkcs8KeyFile};

/// A parsed private key file, possibly still encrypted
pub trait PrivateKeyFile: fmt::Debug + Send + Sync {
    /// Short human readable name of the container type
    fn type_label(&self) -> &'static str;

    /// True when a passphrase is needed to reach the key
    fn is_protected(&self) -> bool;

    /// Decrypt (if needed) and load the key pair
    fn to_key_pair(&self, backend: &CryptoBackend, passphrase: Option<&str>) -> Result<KeyPair>;

    fn supports_passphrase_change(&self) -> bool;

    /// Re-protect the key under `new`; `None` or empty removes protection.
    ///
    /// Read-only formats return [`Error::ReadOnlyFormat`].
    fn change_passphrase(
        &mut self,
        backend: &CryptoBackend,
        old: Option<&str>,
        new: Option<&str>,
    ) -> Result<()>;

    /// File contents as they should be written to disk
    fn formatted_bytes(&self) -> Vec<u8>;

    /// Comment stored with the key, when readable without decryption
    fn comment(&self) -> Option<&str>;
}

/// A container format the registry can detect
pub trait KeyFormat: Send + Sync {
    fn label(&self) -> &'static str;

    /// Cheap check on the raw bytes, no decoding
    fn recognizes(&self, bytes: &[u8]) -> bool;

    fn parse(&self, backend: &CryptoBackend, bytes: &[u8]) -> Result<Box<dyn PrivateKeyFile>>;
}

/// Ordered set of known private key formats
pub struct FormatRegistry {
    formats: Vec<Box<dyn KeyFormat>>,
}

impl FormatRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            formats: Vec::new(),
        }
    }

    /// Add a format; earlier registrations win on ambiguous input
    pub fn register(&mut self, format: Box<dyn KeyFormat>) -> &mut Self {
        self.formats.push(format);
        self
    }

    /// Detect the format of `bytes` and parse it
    pub fn parse(&self, backend: &CryptoBackend, bytes: &[u8]) -> Result<Box<dyn PrivateKeyFile>> {
        let format = self
            .formats
            .iter()
            .find(|format| format.recognizes(bytes))
            .ok_or_else(|| Error::UnsupportedFormat("unrecognized private key file".into()))?;
        debug!(format = format.label(), "detected private key format");
        format.parse(backend, bytes)
    }

    pub fn by_label(&self, label: &str) -> Option<&dyn KeyFormat> {
        self.formats
            .iter()
            .find(|format| format.label().eq_ignore_ascii_case(label))
            .map(|format| format.as_ref())
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.formats.iter().map(|format| format.label()).collect()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry
            .register(Box::new(OpenSshFormat))
            .register(Box::new(Pkcs8Format));
        registry
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("formats", &self.labels())
            .finish()
    }
}
