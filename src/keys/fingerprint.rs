//! Key fingerprints in the textual forms `ssh-keygen -l` prints

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ring::digest;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Digest used for a fingerprint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlg {
    #[default]
    Sha256,
    /// Legacy colon separated hex form
    Md5,
}

impl FromStr for HashAlg {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" => Ok(Self::Sha256),
            "md5" => Ok(Self::Md5),
            other => Err(Error::UnsupportedAlgorithm(format!(
                "fingerprint hash {other}"
            ))),
        }
    }
}

impl fmt::Display for HashAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => f.write_str("SHA256"),
            Self::Md5 => f.write_str("MD5"),
        }
    }
}

/// Fingerprint of an encoded public key blob
pub fn fingerprint(blob: &[u8], hash: HashAlg) -> String {
    match hash {
        HashAlg::Sha256 => {
            let digest = digest::digest(&digest::SHA256, blob);
            let encoded = BASE64.encode(digest.as_ref());
            format!("SHA256:{}", encoded.trim_end_matches('='))
        }
        HashAlg::Md5 => {
            let digest = md5::compute(blob);
            let pairs: Vec<String> = digest.iter().map(|b| format!("{b:02x}")).collect();
            format!("MD5:{}", pairs.join(":"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_form() {
        let fp = fingerprint(b"", HashAlg::Sha256);
        assert_eq!(fp, "SHA256:47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU");
    }

    #[test]
    fn test_md5_form() {
        let fp = fingerprint(b"", HashAlg::Md5);
        assert_eq!(fp, "MD5:d4:1d:8c:d9:8f:00:b2:04:e9:80:09:98:ec:f8:42:7e");
    }

    #[test]
    fn test_parse_hash_name() {
        assert_eq!("MD5".parse::<HashAlg>().unwrap(), HashAlg::Md5);
        assert!("sha1".parse::<HashAlg>().is_err());
    }
}
