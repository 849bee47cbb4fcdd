//! `openssh-key-v1` binary layout

use tracing::trace;
use zeroize::Zeroizing;

use super::cipher::{Cipher, Kdf};
use crate::encoding::{Reader, Writer};
use crate::keys::{CryptoBackend, KeyPair};
use crate::{Error, Result};

pub(crate) const MAGIC: &[u8] = b"openssh-key-v1\0";

/// Parsed outer structure; the private section is still encrypted
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Container {
    pub cipher: Cipher,
    pub kdf: Kdf,
    pub public_key: Vec<u8>,
    pub private_section: Vec<u8>,
    /// AEAD tag following the private section, empty otherwise
    pub tag: Vec<u8>,
}

impl Container {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if !data.starts_with(MAGIC) {
            return Err(Error::UnsupportedFormat("missing openssh-key-v1 magic".into()));
        }
        Self::parse_after_magic(&mut Reader::new(&data[MAGIC.len()..])).map_err(|err| match err {
            Error::UnsupportedFormat(_) => err,
            other => Error::malformed_by("invalid openssh-key-v1 container", other),
        })
    }

    fn parse_after_magic(reader: &mut Reader<'_>) -> Result<Self> {
        let cipher = Cipher::from_name(reader.read_string()?)?;
        let kdf_name = reader.read_string()?;
        let kdf = Kdf::decode(kdf_name, reader.read_binary_string()?)?;
        if cipher.is_encrypted() == matches!(kdf, Kdf::None) {
            return Err(Error::malformed(format!(
                "cipher {cipher} cannot be combined with kdf {kdf_name}"
            )));
        }

        let num_keys = reader.read_u32()?;
        if num_keys != 1 {
            return Err(Error::UnsupportedFormat(format!(
                "containers with {num_keys} keys"
            )));
        }

        let public_key = reader.read_binary_string()?.to_vec();
        let private_section = reader.read_binary_string()?.to_vec();
        if private_section.len() % cipher.block_size() != 0 {
            return Err(Error::malformed(format!(
                "private section of {} bytes is not a multiple of the {}-byte block",
                private_section.len(),
                cipher.block_size()
            )));
        }
        let tag = reader.read_raw(cipher.tag_len())?.to_vec();
        reader.finish()?;

        Ok(Self {
            cipher,
            kdf,
            public_key,
            private_section,
            tag,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = Writer::with_capacity(
            MAGIC.len() + self.public_key.len() + self.private_section.len() + 128,
        );
        writer
            .write_raw(MAGIC)
            .write_string(self.cipher.name())
            .write_string(self.kdf.name())
            .write_binary_string(&self.kdf.encode_options())
            .write_u32(1)
            .write_binary_string(&self.public_key)
            .write_binary_string(&self.private_section)
            .write_raw(&self.tag);
        writer.into_bytes()
    }
}

/// Plaintext private section: check values, key, comment, padding
pub(crate) fn encode_private_section(
    pair: &KeyPair,
    check: u32,
    block_size: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    let mut writer = Writer::new();
    writer.write_u32(check).write_u32(check);
    pair.encode_private(&mut writer)?;
    writer.write_string(pair.comment());

    let mut pad = 1u8;
    while writer.len() % block_size != 0 {
        writer.write_u8(pad);
        pad += 1;
    }
    Ok(Zeroizing::new(writer.into_bytes()))
}

/// Decode a decrypted private section.
///
/// Differing check values mean the decryption key was wrong.
pub(crate) fn decode_private_section(
    backend: &CryptoBackend,
    data: &[u8],
    block_size: usize,
    encrypted: bool,
) -> Result<KeyPair> {
    let mut reader = Reader::new(data);
    let check1 = reader.read_u32()?;
    let check2 = reader.read_u32()?;
    if check1 != check2 {
        return if encrypted {
            Err(Error::InvalidPassphrase)
        } else {
            Err(Error::malformed("check values differ in unencrypted key"))
        };
    }

    let mut pair = KeyPair::decode_private(backend, &mut reader)?;
    let comment = reader.read_string()?;
    pair.set_comment(comment);

    verify_padding(&reader, block_size)?;
    Ok(pair)
}

/// Padding must be the bytes `1, 2, 3, ...` and shorter than a block
fn verify_padding(reader: &Reader<'_>, block_size: usize) -> Result<()> {
    let padding = reader.rest();
    if padding.len() >= block_size {
        return Err(Error::malformed(format!(
            "{} bytes of padding for a {}-byte block",
            padding.len(),
            block_size
        )));
    }
    for (expected, &found) in (1u8..).zip(padding) {
        if found != expected {
            return Err(Error::malformed("invalid private section padding"));
        }
    }
    trace!(len = padding.len(), "padding ok");
    Ok(())
}
