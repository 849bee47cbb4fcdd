//! Length-prefixed SSH wire encoding (RFC 4251 section 5)
//!
//! [`Reader`] is a bounds-checked cursor over a borrowed byte slice. Every
//! read advances the cursor and fails with [`Error::TruncatedInput`] when
//! the input is shorter than the field claims to be; nothing is allocated
//! for a declared length before it has been checked against the input.
//!
//! [`Writer`] is the mirror image and always emits canonical encodings.

mod mpint;

pub use mpint::Mpint;

use crate::{Error, Result};

/// Read cursor over an SSH wire structure
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Offset of the next unread byte
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Bytes already read
    pub fn consumed(&self) -> &'a [u8] {
        &self.data[..self.position]
    }

    /// Bytes not yet read
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    /// Read exactly `len` raw bytes
    pub fn read_raw(&mut self, len: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(Error::TruncatedInput {
                needed: len,
                remaining,
            });
        }
        let start = self.position;
        self.position += len;
        Ok(&self.data[start..self.position])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_raw(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Read a big-endian u32
    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_raw(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a big-endian u64
    pub fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.read_raw(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(buf))
    }

    /// Read a `string` field as raw bytes (4-byte length prefix + data)
    pub fn read_binary_string(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.read_raw(len)
    }

    /// Read a `string` field that must be UTF-8 text
    pub fn read_string(&mut self) -> Result<&'a str> {
        let bytes = self.read_binary_string()?;
        std::str::from_utf8(bytes).map_err(|e| Error::malformed(format!("invalid UTF-8: {e}")))
    }

    /// Read an `mpint` field
    pub fn read_mpint(&mut self) -> Result<Mpint> {
        Ok(Mpint::from_bytes(self.read_binary_string()?))
    }

    /// Read a comma separated `name-list`
    pub fn read_name_list(&mut self) -> Result<Vec<String>> {
        let names = self.read_string()?;
        if names.is_empty() {
            return Ok(Vec::new());
        }
        Ok(names.split(',').map(str::to_string).collect())
    }

    /// Require that the whole input has been consumed
    pub fn finish(&self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(Error::malformed(format!("{n} unexpected trailing bytes"))),
        }
    }
}

/// Growable SSH wire structure
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.write_u8(u8::from(value))
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.write_raw(&value.to_be_bytes())
    }

    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.write_raw(&value.to_be_bytes())
    }

    /// Write a `string` field holding arbitrary bytes
    pub fn write_binary_string(&mut self, bytes: &[u8]) -> &mut Self {
        debug_assert!(bytes.len() <= u32::MAX as usize);
        self.write_u32(bytes.len() as u32);
        self.write_raw(bytes)
    }

    pub fn write_string(&mut self, value: &str) -> &mut Self {
        self.write_binary_string(value.as_bytes())
    }

    pub fn write_mpint(&mut self, value: &Mpint) -> &mut Self {
        self.write_binary_string(value.as_bytes())
    }

    pub fn write_name_list<S: AsRef<str>>(&mut self, names: &[S]) -> &mut Self {
        let joined = names
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(",");
        self.write_string(&joined)
    }
}
