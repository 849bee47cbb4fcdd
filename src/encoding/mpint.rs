//! SSH `mpint`: a big-endian two's-complement integer

use std::fmt;

use crate::{Error, Result};

/// Multiple precision integer as carried on the wire
///
/// The bytes are always held in canonical form: no redundant leading
/// `0x00` or `0xFF` byte, and zero is the empty string.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Mpint {
    bytes: Vec<u8>,
}

impl Mpint {
    /// Build from two's-complement bytes, dropping redundant sign bytes.
    pub fn from_bytes(raw: &[u8]) -> Self {
        let mut start = 0;
        while start < raw.len() {
            let rest = &raw[start..];
            let redundant = match rest {
                [0x00] => true,
                [0x00, next, ..] => next & 0x80 == 0,
                [0xFF, next, ..] => next & 0x80 != 0,
                _ => false,
            };
            if !redundant {
                break;
            }
            start += 1;
        }
        Self {
            bytes: raw[start..].to_vec(),
        }
    }

    /// Build a non-negative value from its unsigned big-endian magnitude.
    pub fn from_positive_bytes(magnitude: &[u8]) -> Self {
        let first = magnitude
            .iter()
            .position(|&b| b != 0)
            .unwrap_or(magnitude.len());
        let digits = &magnitude[first..];

        let mut bytes = Vec::with_capacity(digits.len() + 1);
        if digits.first().is_some_and(|b| b & 0x80 != 0) {
            bytes.push(0);
        }
        bytes.extend_from_slice(digits);
        Self { bytes }
    }

    /// Canonical two's-complement bytes, as written on the wire
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Unsigned magnitude of a non-negative value, without the sign byte
    pub fn as_positive_bytes(&self) -> Result<&[u8]> {
        if self.is_negative() {
            return Err(Error::malformed("expected a non-negative integer"));
        }
        match self.bytes.split_first() {
            Some((0, rest)) => Ok(rest),
            _ => Ok(&self.bytes),
        }
    }

    /// Magnitude left-padded with zeros to exactly `width` bytes
    pub fn to_fixed_width(&self, width: usize) -> Result<Vec<u8>> {
        let magnitude = self.as_positive_bytes()?;
        if magnitude.len() > width {
            return Err(Error::malformed(format!(
                "integer of {} bytes does not fit in {}",
                magnitude.len(),
                width
            )));
        }
        let mut out = vec![0u8; width - magnitude.len()];
        out.extend_from_slice(magnitude);
        Ok(out)
    }

    pub fn is_negative(&self) -> bool {
        self.bytes.first().is_some_and(|b| b & 0x80 != 0)
    }

    pub fn is_zero(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of significant bits of a non-negative value
    pub fn bit_length(&self) -> usize {
        let Ok(magnitude) = self.as_positive_bytes() else {
            return self.bytes.len() * 8;
        };
        match magnitude.first() {
            Some(&top) => (magnitude.len() - 1) * 8 + (8 - top.leading_zeros() as usize),
            None => 0,
        }
    }
}

impl zeroize::Zeroize for Mpint {
    fn zeroize(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for Mpint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mpint(0x{})", hex::encode(&self.bytes))
    }
}
