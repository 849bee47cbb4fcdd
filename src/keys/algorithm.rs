//! Algorithm and curve identities

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Error, Result};

const CERT_SUFFIX: &str = "-cert-v01@openssh.com";
const ECDSA_PREFIX: &str = "ecdsa-sha2-";

/// NIST curves usable with ECDSA keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EcdsaCurve {
    #[serde(rename = "nistp256")]
    NistP256,
    #[serde(rename = "nistp384")]
    NistP384,
    #[serde(rename = "nistp521")]
    NistP521,
}

impl EcdsaCurve {
    pub const ALL: [EcdsaCurve; 3] = [Self::NistP256, Self::NistP384, Self::NistP521];

    /// Resolve an SSH identifier or one of its SEC 2 / ANSI X9.62 aliases
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "nistp256" | "secp256r1" | "prime256v1" => Ok(Self::NistP256),
            "nistp384" | "secp384r1" => Ok(Self::NistP384),
            "nistp521" | "secp521r1" => Ok(Self::NistP521),
            other => {
                warn!(curve = other, "unrecognized curve name");
                Err(Error::UnsupportedCurve(other.to_string()))
            }
        }
    }

    /// Identifier used inside SSH key blobs
    pub fn identifier(&self) -> &'static str {
        match self {
            Self::NistP256 => "nistp256",
            Self::NistP384 => "nistp384",
            Self::NistP521 => "nistp521",
        }
    }

    /// SEC 2 name of the curve
    pub fn standard_name(&self) -> &'static str {
        match self {
            Self::NistP256 => "secp256r1",
            Self::NistP384 => "secp384r1",
            Self::NistP521 => "secp521r1",
        }
    }

    /// Size of the group order in bits
    pub fn bit_length(&self) -> usize {
        match self {
            Self::NistP256 => 256,
            Self::NistP384 => 384,
            Self::NistP521 => 521,
        }
    }

    /// Size of one field element in bytes
    pub fn field_size(&self) -> usize {
        self.bit_length().div_ceil(8)
    }

    /// Length of an uncompressed SEC1 point
    pub fn point_size(&self) -> usize {
        1 + 2 * self.field_size()
    }
}

impl fmt::Display for EcdsaCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

/// Public key algorithm of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    Rsa,
    Dsa,
    Ecdsa(EcdsaCurve),
    Ed25519,
}

impl KeyAlgorithm {
    /// Wire name of a plain public key
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rsa => "ssh-rsa",
            Self::Dsa => "ssh-dss",
            Self::Ecdsa(EcdsaCurve::NistP256) => "ecdsa-sha2-nistp256",
            Self::Ecdsa(EcdsaCurve::NistP384) => "ecdsa-sha2-nistp384",
            Self::Ecdsa(EcdsaCurve::NistP521) => "ecdsa-sha2-nistp521",
            Self::Ed25519 => "ssh-ed25519",
        }
    }

    /// Wire name of an OpenSSH certificate over this algorithm
    pub fn certificate_name(&self) -> &'static str {
        match self {
            Self::Rsa => "ssh-rsa-cert-v01@openssh.com",
            Self::Dsa => "ssh-dss-cert-v01@openssh.com",
            Self::Ecdsa(EcdsaCurve::NistP256) => "ecdsa-sha2-nistp256-cert-v01@openssh.com",
            Self::Ecdsa(EcdsaCurve::NistP384) => "ecdsa-sha2-nistp384-cert-v01@openssh.com",
            Self::Ecdsa(EcdsaCurve::NistP521) => "ecdsa-sha2-nistp521-cert-v01@openssh.com",
            Self::Ed25519 => "ssh-ed25519-cert-v01@openssh.com",
        }
    }

    /// Parse a key or certificate name.
    ///
    /// Returns the base algorithm and whether the name was a certificate
    /// name.
    pub fn from_name(name: &str) -> Result<(Self, bool)> {
        let (base, is_cert) = match name.strip_suffix(CERT_SUFFIX) {
            Some(base) => (base, true),
            None => (name, false),
        };
        let algorithm = match base {
            "ssh-rsa" => Self::Rsa,
            "ssh-dss" => Self::Dsa,
            "ssh-ed25519" => Self::Ed25519,
            _ => match base.strip_prefix(ECDSA_PREFIX) {
                Some(curve) => Self::Ecdsa(EcdsaCurve::from_name(curve)?),
                None => {
                    warn!(algorithm = name, "unrecognized key algorithm");
                    return Err(Error::UnsupportedAlgorithm(name.to_string()));
                }
            },
        };
        Ok((algorithm, is_cert))
    }

    /// Name written in front of signatures made by this key
    pub fn signature_name(&self) -> &'static str {
        match self {
            Self::Rsa => RsaHash::Sha512.signature_name(),
            other => other.name(),
        }
    }

    /// Nominal strength, before any key size is taken into account
    pub fn security_level(&self) -> SecurityLevel {
        match self {
            Self::Dsa => SecurityLevel::Weak,
            Self::Rsa => SecurityLevel::Medium,
            Self::Ecdsa(EcdsaCurve::NistP256) | Self::Ed25519 => SecurityLevel::Strong,
            Self::Ecdsa(_) => SecurityLevel::Paranoid,
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KeyAlgorithm {
    type Err = Error;

    /// Accepts wire names and the short labels used by `ssh-keygen -t`
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rsa" => Ok(Self::Rsa),
            "dsa" => Ok(Self::Dsa),
            "ecdsa" => Ok(Self::Ecdsa(EcdsaCurve::NistP256)),
            "ed25519" => Ok(Self::Ed25519),
            other => Self::from_name(other).map(|(algorithm, _)| algorithm),
        }
    }
}

/// Digest used by an RSA PKCS#1 v1.5 signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RsaHash {
    Sha1,
    Sha256,
    Sha512,
}

impl RsaHash {
    pub fn signature_name(&self) -> &'static str {
        match self {
            Self::Sha1 => "ssh-rsa",
            Self::Sha256 => "rsa-sha2-256",
            Self::Sha512 => "rsa-sha2-512",
        }
    }

    pub fn from_signature_name(name: &str) -> Option<Self> {
        match name {
            "ssh-rsa" => Some(Self::Sha1),
            "rsa-sha2-256" => Some(Self::Sha256),
            "rsa-sha2-512" => Some(Self::Sha512),
            _ => None,
        }
    }
}

/// Coarse strength rating used by the backend policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Weak,
    Medium,
    Strong,
    Paranoid,
}

impl SecurityLevel {
    /// Rating of an RSA modulus size
    pub fn for_rsa_bits(bits: usize) -> Self {
        match bits {
            0..=2047 => Self::Weak,
            2048..=3071 => Self::Medium,
            3072..=7679 => Self::Strong,
            _ => Self::Paranoid,
        }
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Weak => "weak",
            Self::Medium => "medium",
            Self::Strong => "strong",
            Self::Paranoid => "paranoid",
        };
        f.write_str(label)
    }
}
