//! Configuration management for sshkey
//!
//! Loads the verification policy and key generation defaults from a TOML
//! file and turns them into a [`CryptoBackend`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::formats::{Cipher, OpenSshOptions};
use crate::keys::{BackendPolicy, CryptoBackend, KeyAlgorithm, KeyGenSpec, MIN_RSA_BITS};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML rendering error
    #[error("Failed to render TOML: {0}")]
    Render(#[from] toml::ser::Error),

    /// Validation error
    #[error("Config validation failed: {0}")]
    Validation(String),
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Verification policy handed to the crypto backend
    #[serde(default)]
    pub policy: BackendPolicy,

    /// Defaults for `sshkey generate`
    #[serde(default)]
    pub keygen: KeygenConfig,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Key generation defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeygenConfig {
    /// Algorithm used when `--type` is not given
    #[serde(default = "default_algorithm")]
    pub default_algorithm: String,

    /// RSA modulus size
    #[serde(default = "default_rsa_bits")]
    pub rsa_bits: usize,

    /// Cipher for passphrase protected keys
    #[serde(default)]
    pub cipher: Cipher,

    /// bcrypt-pbkdf rounds
    #[serde(default = "default_kdf_rounds")]
    pub kdf_rounds: u32,

    /// Comment stored with new keys; `~` is expanded
    #[serde(default = "default_comment")]
    pub comment: String,
}

fn default_algorithm() -> String {
    "ed25519".to_string()
}

fn default_rsa_bits() -> usize {
    crate::keys::DEFAULT_RSA_BITS
}

fn default_kdf_rounds() -> u32 {
    16
}

fn default_comment() -> String {
    String::new()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for KeygenConfig {
    fn default() -> Self {
        Self {
            default_algorithm: default_algorithm(),
            rsa_bits: default_rsa_bits(),
            cipher: Cipher::default(),
            kdf_rounds: default_kdf_rounds(),
            comment: default_comment(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            policy: BackendPolicy::default(),
            keygen: KeygenConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Checks in order:
    /// 1. Path from SSHKEY_CONFIG environment variable
    /// 2. ~/.config/sshkey/config.toml
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_path() {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration with an optional explicit path
    pub fn load_config(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) => Self::load_from_path(&expand_path(path)),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(toml_str)?;
        config.keygen.comment = shellexpand::tilde(&config.keygen.comment).into_owned();
        config.validate()?;
        Ok(config)
    }

    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("sshkey").join("config.toml"))
    }

    fn find_config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SSHKEY_CONFIG") {
            let path = expand_path(Path::new(&path));
            if path.exists() {
                return Some(path);
            }
        }

        Self::default_path().filter(|p| p.exists())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.policy.min_rsa_bits < 512 {
            return Err(ConfigError::Validation(
                "policy.min_rsa_bits must be at least 512".to_string(),
            ));
        }
        if self.keygen.rsa_bits < MIN_RSA_BITS {
            return Err(ConfigError::Validation(format!(
                "keygen.rsa_bits must be at least {MIN_RSA_BITS}"
            )));
        }
        if self.keygen.kdf_rounds == 0 {
            return Err(ConfigError::Validation(
                "keygen.kdf_rounds must be positive".to_string(),
            ));
        }
        let algorithm = self.default_algorithm()?;
        KeyGenSpec::for_algorithm(algorithm, self.keygen.rsa_bits).map_err(|_| {
            ConfigError::Validation(format!(
                "keygen.default_algorithm '{}' cannot be generated",
                self.keygen.default_algorithm
            ))
        })?;
        Ok(())
    }

    /// Parsed `keygen.default_algorithm`
    pub fn default_algorithm(&self) -> Result<KeyAlgorithm, ConfigError> {
        self.keygen.default_algorithm.parse().map_err(|_| {
            ConfigError::Validation(format!(
                "unknown keygen.default_algorithm '{}'",
                self.keygen.default_algorithm
            ))
        })
    }

    /// Crypto backend carrying this configuration's policy
    pub fn backend(&self) -> CryptoBackend {
        CryptoBackend::new(self.policy.clone())
    }

    /// Protection settings for newly written OpenSSH keys
    pub fn openssh_options(&self) -> OpenSshOptions {
        OpenSshOptions {
            cipher: self.keygen.cipher,
            kdf_rounds: self.keygen.kdf_rounds,
        }
    }

    /// Save configuration to `path`, or the default location
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let path = match path {
            Some(path) => expand_path(path),
            None => Self::default_path().ok_or_else(|| {
                ConfigError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "Could not find config directory",
                ))
            })?,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, toml::to_string_pretty(self)?)?;
        Ok(path)
    }

    /// Write the commented example file, refusing to overwrite unless `force`
    pub fn generate_example_config(path: &Path, force: bool) -> Result<(), ConfigError> {
        if !force && path.exists() {
            return Err(ConfigError::Validation(
                "Config file already exists. Use --force to overwrite.".to_string(),
            ));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, Self::generate_example())?;
        Ok(())
    }

    /// Generate example configuration file
    pub fn generate_example() -> String {
        let config = Config::default();
        format!(
            r#"# sshkey Configuration File
# Location: ~/.config/sshkey/config.toml (or $SSHKEY_CONFIG)

# Logging level (trace, debug, info, warn, error)
log_level = "{}"

# Verification policy
[policy]
# Accept ssh-rsa (SHA-1) and ssh-dss signatures
allow_sha1_signatures = {}
# Smallest RSA modulus accepted
min_rsa_bits = {}
# weak, medium, strong or paranoid
min_security_level = "{}"

# Defaults for `sshkey generate`
[keygen]
# ed25519, ecdsa, rsa or a full algorithm name
default_algorithm = "{}"
rsa_bits = {}
# aes256-ctr or aes256-gcm@openssh.com
cipher = "{}"
kdf_rounds = {}
comment = "{}"
"#,
            config.log_level,
            config.policy.allow_sha1_signatures,
            config.policy.min_rsa_bits,
            config.policy.min_security_level,
            config.keygen.default_algorithm,
            config.keygen.rsa_bits,
            config.keygen.cipher,
            config.keygen.kdf_rounds,
            config.keygen.comment,
        )
    }
}

/// Expand tilde in path
fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    let expanded = shellexpand::tilde(path_str.as_ref());
    PathBuf::from(expanded.into_owned())
}
