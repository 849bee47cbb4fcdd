//! Ciphers and KDF of the `openssh-key-v1` container

use std::fmt;
use std::str::FromStr;

use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes256Gcm, Nonce, Tag,
};
use ctr::cipher::{KeyIvInit, StreamCipher};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use zeroize::Zeroizing;

use crate::encoding::{Reader, Writer};
use crate::{Error, Result};

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

const KEY_LEN: usize = 32;
pub(crate) const SALT_LEN: usize = 16;
pub(crate) const GCM_TAG_LEN: usize = 16;

/// Cipher protecting the private section
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cipher {
    #[serde(rename = "none")]
    None,
    #[default]
    #[serde(rename = "aes256-ctr")]
    Aes256Ctr,
    #[serde(rename = "aes256-gcm@openssh.com")]
    Aes256Gcm,
}

impl Cipher {
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Aes256Ctr => "aes256-ctr",
            Self::Aes256Gcm => "aes256-gcm@openssh.com",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "none" => Ok(Self::None),
            "aes256-ctr" => Ok(Self::Aes256Ctr),
            "aes256-gcm@openssh.com" => Ok(Self::Aes256Gcm),
            other => Err(Error::UnsupportedFormat(format!("cipher {other}"))),
        }
    }

    pub fn is_encrypted(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Alignment of the private section
    pub fn block_size(&self) -> usize {
        match self {
            Self::None => 8,
            Self::Aes256Ctr | Self::Aes256Gcm => 16,
        }
    }

    fn iv_len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Aes256Ctr => 16,
            Self::Aes256Gcm => 12,
        }
    }

    /// Bytes following the private section in the container
    pub fn tag_len(&self) -> usize {
        match self {
            Self::Aes256Gcm => GCM_TAG_LEN,
            _ => 0,
        }
    }

    /// Encrypt in place, returning the authentication tag (empty unless AEAD)
    pub(crate) fn encrypt(&self, key_iv: &[u8], buffer: &mut [u8]) -> Result<Vec<u8>> {
        let (key, iv) = self.split_key_iv(key_iv)?;
        match self {
            Self::None => Ok(Vec::new()),
            Self::Aes256Ctr => {
                let mut cipher = Aes256Ctr::new_from_slices(key, iv)
                    .map_err(|e| Error::Crypto(format!("aes256-ctr init: {e}")))?;
                cipher.apply_keystream(buffer);
                Ok(Vec::new())
            }
            Self::Aes256Gcm => {
                let cipher = Aes256Gcm::new_from_slice(key)
                    .map_err(|e| Error::Crypto(format!("aes256-gcm init: {e}")))?;
                let tag = cipher
                    .encrypt_in_place_detached(Nonce::from_slice(iv), b"", buffer)
                    .map_err(|e| Error::Crypto(format!("aes256-gcm encryption failed: {e}")))?;
                Ok(tag.to_vec())
            }
        }
    }

    /// Decrypt in place; a bad tag means a wrong passphrase
    pub(crate) fn decrypt(&self, key_iv: &[u8], buffer: &mut [u8], tag: &[u8]) -> Result<()> {
        let (key, iv) = self.split_key_iv(key_iv)?;
        match self {
            Self::None => Ok(()),
            Self::Aes256Ctr => {
                let mut cipher = Aes256Ctr::new_from_slices(key, iv)
                    .map_err(|e| Error::Crypto(format!("aes256-ctr init: {e}")))?;
                cipher.apply_keystream(buffer);
                Ok(())
            }
            Self::Aes256Gcm => {
                if tag.len() != GCM_TAG_LEN {
                    return Err(Error::malformed("truncated aes256-gcm tag"));
                }
                let cipher = Aes256Gcm::new_from_slice(key)
                    .map_err(|e| Error::Crypto(format!("aes256-gcm init: {e}")))?;
                cipher
                    .decrypt_in_place_detached(
                        Nonce::from_slice(iv),
                        b"",
                        buffer,
                        Tag::from_slice(tag),
                    )
                    .map_err(|_| Error::InvalidPassphrase)
            }
        }
    }

    fn split_key_iv<'a>(&self, key_iv: &'a [u8]) -> Result<(&'a [u8], &'a [u8])> {
        if !self.is_encrypted() {
            let empty: &[u8] = &[];
            return Ok((empty, empty));
        }
        if key_iv.len() != KEY_LEN + self.iv_len() {
            return Err(Error::Crypto(format!(
                "{} needs {} bytes of key material, got {}",
                self.name(),
                KEY_LEN + self.iv_len(),
                key_iv.len()
            )));
        }
        Ok(key_iv.split_at(KEY_LEN))
    }
}

impl fmt::Display for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Cipher {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "aes256-gcm" => Ok(Self::Aes256Gcm),
            other => Self::from_name(other),
        }
    }
}

/// Key derivation for encrypted containers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kdf {
    None,
    Bcrypt { salt: Vec<u8>, rounds: u32 },
}

impl Kdf {
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bcrypt { .. } => "bcrypt",
        }
    }

    /// Parse the KDF name and its options string
    pub(crate) fn decode(name: &str, options: &[u8]) -> Result<Self> {
        match name {
            "none" => {
                if !options.is_empty() {
                    return Err(Error::malformed("options given for kdf none"));
                }
                Ok(Self::None)
            }
            "bcrypt" => {
                let mut reader = Reader::new(options);
                let salt = reader.read_binary_string()?.to_vec();
                let rounds = reader.read_u32()?;
                reader.finish()?;
                if rounds == 0 {
                    return Err(Error::malformed("bcrypt rounds must be positive"));
                }
                Ok(Self::Bcrypt { salt, rounds })
            }
            other => Err(Error::UnsupportedFormat(format!("kdf {other}"))),
        }
    }

    pub(crate) fn encode_options(&self) -> Vec<u8> {
        match self {
            Self::None => Vec::new(),
            Self::Bcrypt { salt, rounds } => {
                let mut writer = Writer::new();
                writer.write_binary_string(salt).write_u32(*rounds);
                writer.into_bytes()
            }
        }
    }

    /// Derive the key and IV for `cipher` from `passphrase`
    #[instrument(skip_all, fields(kdf = self.name(), cipher = %cipher))]
    pub(crate) fn derive(&self, passphrase: &str, cipher: Cipher) -> Result<Zeroizing<Vec<u8>>> {
        let Self::Bcrypt { salt, rounds } = self else {
            return Err(Error::malformed(format!(
                "cipher {cipher} requires a key derivation function"
            )));
        };
        let mut out = Zeroizing::new(vec![0u8; KEY_LEN + cipher.iv_len()]);
        bcrypt_pbkdf::bcrypt_pbkdf(passphrase.as_bytes(), salt, *rounds, &mut out)
            .map_err(|e| Error::Crypto(format!("bcrypt-pbkdf failed: {e}")))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Cipher::Aes256Ctr)]
    #[case(Cipher::Aes256Gcm)]
    fn test_encrypt_decrypt(#[case] cipher: Cipher) {
        let kdf = Kdf::Bcrypt {
            salt: vec![5; SALT_LEN],
            rounds: 1,
        };
        let key_iv = kdf.derive("secret", cipher).unwrap();
        let mut buffer = vec![0x42u8; 32];
        let tag = cipher.encrypt(&key_iv, &mut buffer).unwrap();
        assert_ne!(buffer, vec![0x42u8; 32]);
        assert_eq!(tag.len(), cipher.tag_len());

        cipher.decrypt(&key_iv, &mut buffer, &tag).unwrap();
        assert_eq!(buffer, vec![0x42u8; 32]);
    }

    #[test]
    fn test_gcm_wrong_key_is_invalid_passphrase() {
        let cipher = Cipher::Aes256Gcm;
        let salt = vec![1; SALT_LEN];
        let good = Kdf::Bcrypt { salt: salt.clone(), rounds: 1 }
            .derive("right", cipher)
            .unwrap();
        let bad = Kdf::Bcrypt { salt, rounds: 1 }.derive("wrong", cipher).unwrap();

        let mut buffer = vec![7u8; 16];
        let tag = cipher.encrypt(&good, &mut buffer).unwrap();
        assert!(matches!(
            cipher.decrypt(&bad, &mut buffer, &tag),
            Err(Error::InvalidPassphrase)
        ));
    }

    #[test]
    fn test_kdf_options_round_trip() {
        let kdf = Kdf::Bcrypt {
            salt: vec![9; SALT_LEN],
            rounds: 16,
        };
        assert_eq!(Kdf::decode("bcrypt", &kdf.encode_options()).unwrap(), kdf);
        assert!(matches!(
            Kdf::decode("scrypt", &[]),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(matches!(
            Cipher::from_name("3des-cbc"),
            Err(Error::UnsupportedFormat(_))
        ));
    }
}
