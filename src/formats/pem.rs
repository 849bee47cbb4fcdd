//! Minimal PEM armor: marker lines around base64

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::{Error, Result};

fn begin_marker(label: &str) -> String {
    format!("-----BEGIN {label}-----")
}

fn end_marker(label: &str) -> String {
    format!("-----END {label}-----")
}

/// True when `bytes` is text carrying a `BEGIN label` marker
pub(crate) fn has_label(bytes: &[u8], label: &str) -> bool {
    std::str::from_utf8(bytes).is_ok_and(|text| text.contains(&begin_marker(label)))
}

/// Extract and decode the body between the `label` markers
pub(crate) fn decode(bytes: &[u8], label: &str) -> Result<Vec<u8>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| Error::UnsupportedFormat("PEM input is not text".into()))?;

    let start_marker = begin_marker(label);
    let end_marker = end_marker(label);
    let start = text
        .find(&start_marker)
        .ok_or_else(|| Error::UnsupportedFormat(format!("missing {start_marker}")))?;
    let body_start = start + start_marker.len();
    let end = text[body_start..]
        .find(&end_marker)
        .map(|offset| body_start + offset)
        .ok_or_else(|| Error::malformed(format!("missing {end_marker}")))?;

    let body: String = text[body_start..end]
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let der = BASE64
        .decode(body)
        .map_err(|e| Error::malformed_by("PEM body", e.into()))?;
    Ok(der)
}

/// Armor `der` under `label`, wrapping base64 lines at `width` columns
pub(crate) fn encode(der: &[u8], label: &str, width: usize) -> String {
    let body = BASE64.encode(der);
    let mut out = String::with_capacity(body.len() + body.len() / width + 2 * label.len() + 40);
    out.push_str(&begin_marker(label));
    out.push('\n');
    // base64 output is ASCII, so byte chunks are valid UTF-8
    for line in body.as_bytes().chunks(width) {
        out.push_str(&String::from_utf8_lossy(line));
        out.push('\n');
    }
    out.push_str(&end_marker(label));
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wraps_and_round_trips() {
        let der: Vec<u8> = (0..=255).collect();
        let text = encode(&der, "TEST KEY", 70);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "-----BEGIN TEST KEY-----");
        assert_eq!(lines[1].len(), 70);
        assert_eq!(*lines.last().unwrap(), "-----END TEST KEY-----");
        assert!(text.ends_with('\n'));
        assert_eq!(decode(text.as_bytes(), "TEST KEY").unwrap(), der);
    }

    #[test]
    fn test_crlf_tolerated() {
        let text = encode(b"hello world", "X", 4).replace('\n', "\r\n");
        assert_eq!(decode(text.as_bytes(), "X").unwrap(), b"hello world");
    }

    #[test]
    fn test_missing_markers() {
        assert!(matches!(
            decode(b"nothing here", "X"),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(matches!(
            decode(b"-----BEGIN X-----\naGVsbG8=\n", "X"),
            Err(Error::MalformedKey { .. })
        ));
        assert!(has_label(b"-----BEGIN X-----", "X"));
        assert!(!has_label(&[0xff, 0xfe], "X"));
    }
}
