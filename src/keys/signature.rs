//! Signature blob framing
//!
//! Signatures reach us in two layouts:
//!
//! * legacy: `string raw`
//! * current: `string algorithm-name, string raw`
//!
//! After the first length prefix, if more bytes follow than that length
//! covers, the prefix belonged to an algorithm name and the blob is in the
//! current layout. If the length covers exactly the rest, it is the legacy
//! layout.

use tracing::trace;

use crate::encoding::{Mpint, Reader, Writer};
use crate::{Error, Result};

/// A signature split into its optional algorithm name and raw bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureBlob<'a> {
    /// Name carried in the current layout, `None` for the legacy one.
    /// Kept as bytes so a garbled name still reports as a mismatch.
    pub algorithm: Option<&'a [u8]>,
    /// Algorithm specific signature bytes
    pub raw: &'a [u8],
}

impl<'a> SignatureBlob<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let declared = reader.read_u32()? as usize;

        if reader.remaining() > declared {
            let name = reader.read_raw(declared)?;
            let raw = reader.read_binary_string()?;
            if !reader.is_empty() {
                return Err(Error::MalformedSignature(format!(
                    "{} bytes after the signature",
                    reader.remaining()
                )));
            }
            trace!(
                algorithm = %String::from_utf8_lossy(name),
                len = raw.len(),
                "named signature layout"
            );
            Ok(Self {
                algorithm: Some(name),
                raw,
            })
        } else {
            let raw = reader.read_raw(declared)?;
            trace!(len = raw.len(), "legacy signature layout");
            Ok(Self {
                algorithm: None,
                raw,
            })
        }
    }

    /// The embedded name, if present and valid UTF-8
    pub fn algorithm_name(&self) -> Option<&'a str> {
        self.algorithm.and_then(|name| std::str::from_utf8(name).ok())
    }

    /// Reject a named signature whose name is not one of `accepted`.
    pub fn check_algorithm(&self, accepted: &[&str]) -> Result<()> {
        match self.algorithm {
            Some(found) if !accepted.iter().any(|name| name.as_bytes() == found) => {
                Err(Error::SignatureAlgorithmMismatch {
                    expected: accepted.join(" | "),
                    found: String::from_utf8_lossy(found).into_owned(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Encode in the current layout
    pub fn encode(algorithm: &str, raw: &[u8]) -> Vec<u8> {
        let mut writer = Writer::with_capacity(algorithm.len() + raw.len() + 8);
        writer.write_string(algorithm).write_binary_string(raw);
        writer.into_bytes()
    }

    /// Encode in the legacy layout
    pub fn encode_legacy(raw: &[u8]) -> Vec<u8> {
        let mut writer = Writer::with_capacity(raw.len() + 4);
        writer.write_binary_string(raw);
        writer.into_bytes()
    }
}

/// Convert the SSH `mpint r, mpint s` pair to a DER `Ecdsa-Sig-Value`.
pub(crate) fn ecdsa_raw_to_der(raw: &[u8]) -> Result<Vec<u8>> {
    let mut reader = Reader::new(raw);
    let r = reader.read_mpint()?;
    let s = reader.read_mpint()?;
    if !reader.is_empty() {
        return Err(Error::MalformedSignature(
            "unexpected bytes after ECDSA s value".into(),
        ));
    }

    let mut body = Vec::with_capacity(r.as_bytes().len() + s.as_bytes().len() + 8);
    der_integer(&r, &mut body);
    der_integer(&s, &mut body);

    let mut der = Vec::with_capacity(body.len() + 4);
    der.push(0x30);
    der_length(body.len(), &mut der);
    der.extend_from_slice(&body);
    Ok(der)
}

/// Pack unsigned big-endian `r` and `s` into the SSH raw ECDSA form.
pub(crate) fn ecdsa_raw_from_scalars(r: &[u8], s: &[u8]) -> Vec<u8> {
    let mut writer = Writer::new();
    writer
        .write_mpint(&Mpint::from_positive_bytes(r))
        .write_mpint(&Mpint::from_positive_bytes(s));
    writer.into_bytes()
}

fn der_integer(value: &Mpint, out: &mut Vec<u8>) {
    // An mpint's canonical bytes are already minimal two's complement,
    // which is DER's INTEGER content except that zero needs one byte.
    let content = match value.as_bytes() {
        [] => &[0u8][..],
        bytes => bytes,
    };
    out.push(0x02);
    der_length(content.len(), out);
    out.extend_from_slice(content);
}

fn der_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
    let significant = &bytes[first..];
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_named_layout() {
        let blob = SignatureBlob::encode("ssh-ed25519", &[7; 64]);
        let parsed = SignatureBlob::parse(&blob).unwrap();
        assert_eq!(parsed.algorithm_name(), Some("ssh-ed25519"));
        assert_eq!(parsed.raw, &[7; 64][..]);
    }

    #[test]
    fn test_legacy_layout() {
        let blob = SignatureBlob::encode_legacy(&[1, 2, 3]);
        let parsed = SignatureBlob::parse(&blob).unwrap();
        assert_eq!(parsed.algorithm, None);
        assert_eq!(parsed.algorithm_name(), None);
        assert_eq!(parsed.raw, &[1, 2, 3]);
    }

    #[test]
    fn test_short_blob_is_truncated() {
        let mut blob = SignatureBlob::encode_legacy(&[1, 2, 3]);
        blob.pop();
        assert!(matches!(
            SignatureBlob::parse(&blob),
            Err(Error::TruncatedInput { .. })
        ));
        assert!(matches!(
            SignatureBlob::parse(&[0, 0]),
            Err(Error::TruncatedInput { .. })
        ));
    }

    #[test]
    fn test_trailing_garbage_after_named_layout() {
        let mut blob = SignatureBlob::encode("ssh-ed25519", &[7; 64]);
        blob.push(0);
        assert!(matches!(
            SignatureBlob::parse(&blob),
            Err(Error::MalformedSignature(_))
        ));
    }

    #[test]
    fn test_algorithm_check() {
        let blob = SignatureBlob::encode("ssh-rsa", &[0; 8]);
        let parsed = SignatureBlob::parse(&blob).unwrap();
        assert!(parsed.check_algorithm(&["ssh-rsa", "rsa-sha2-256"]).is_ok());
        let err = parsed.check_algorithm(&["ecdsa-sha2-nistp256"]).unwrap_err();
        assert!(matches!(
            err,
            Error::SignatureAlgorithmMismatch { found, .. } if found == "ssh-rsa"
        ));

        // A name that is not even UTF-8 is still just the wrong name
        let mut garbled = Writer::new();
        garbled.write_binary_string(&[0xff, 0xfe, 0x00]).write_binary_string(&[0; 8]);
        let garbled = garbled.into_bytes();
        let parsed = SignatureBlob::parse(&garbled).unwrap();
        assert_eq!(parsed.algorithm_name(), None);
        assert!(matches!(
            parsed.check_algorithm(&["ecdsa-sha2-nistp256"]),
            Err(Error::SignatureAlgorithmMismatch { .. })
        ));

        let legacy = SignatureBlob::encode_legacy(&[0; 8]);
        let parsed = SignatureBlob::parse(&legacy).unwrap();
        assert!(parsed.check_algorithm(&["ecdsa-sha2-nistp256"]).is_ok());
    }

    #[test]
    fn test_der_short_form() {
        let raw = ecdsa_raw_from_scalars(&[0x01], &[0x80]);
        let der = ecdsa_raw_to_der(&raw).unwrap();
        assert_eq!(der, vec![0x30, 0x07, 0x02, 0x01, 0x01, 0x02, 0x02, 0x00, 0x80]);
    }

    #[test]
    fn test_der_zero_integer() {
        let raw = ecdsa_raw_from_scalars(&[], &[0x05]);
        let der = ecdsa_raw_to_der(&raw).unwrap();
        assert_eq!(der, vec![0x30, 0x06, 0x02, 0x01, 0x00, 0x02, 0x01, 0x05]);
    }

    #[test]
    fn test_der_long_form_for_p521_sized_values() {
        let r = [0xff; 66];
        let s = [0x01; 66];
        let der = ecdsa_raw_to_der(&ecdsa_raw_from_scalars(&r, &s)).unwrap();
        // 2 + 67 for r, 2 + 66 for s
        assert_eq!(&der[..3], &[0x30, 0x81, 137]);
        assert_eq!(der.len(), 3 + 137);
        assert_eq!(&der[3..6], &[0x02, 67, 0x00]);
    }

    #[test]
    fn test_ecdsa_raw_trailing_bytes() {
        let mut raw = ecdsa_raw_from_scalars(&[1], &[2]);
        raw.push(0);
        assert!(matches!(
            ecdsa_raw_to_der(&raw),
            Err(Error::MalformedSignature(_))
        ));
    }
}
