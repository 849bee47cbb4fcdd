//! File handling and rendering shared by the `sshkey` subcommands

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tokio::io::AsyncWriteExt;

use crate::cert::Certificate;
use crate::formats::{FormatRegistry, PrivateKeyFile};
use crate::keys::{CryptoBackend, HashAlg, KeyPair, PublicKey, SshPublicKey};

/// Environment variable holding the passphrase of an existing key
pub const PASSPHRASE_ENV: &str = "SSHKEY_PASSPHRASE";

/// Environment variable holding the passphrase to protect a key with
pub const NEW_PASSPHRASE_ENV: &str = "SSHKEY_NEW_PASSPHRASE";

/// What a key file on disk turned out to hold
#[derive(Debug)]
pub enum KeyFile {
    Public {
        key: PublicKey,
        comment: Option<String>,
    },
    Private(Box<dyn PrivateKeyFile>),
}

/// Read `path` as a `.pub` line or any registered private key format
pub async fn load_key_file(
    backend: &CryptoBackend,
    registry: &FormatRegistry,
    path: &Path,
) -> Result<KeyFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if let Ok(file) = registry.parse(backend, &bytes) {
        return Ok(KeyFile::Private(file));
    }

    let text = std::str::from_utf8(&bytes)
        .with_context(|| format!("{} is neither a key file nor text", path.display()))?;
    let line = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .with_context(|| format!("{} is empty", path.display()))?;
    let (key, comment) = PublicKey::from_openssh_with_comment(backend, line)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(KeyFile::Public { key, comment })
}

/// Decrypt a private key file with `passphrase`, falling back to the
/// environment
pub fn unlock(
    backend: &CryptoBackend,
    file: &dyn PrivateKeyFile,
    passphrase: Option<&str>,
) -> Result<KeyPair> {
    let from_env = std::env::var(PASSPHRASE_ENV).ok();
    let passphrase = passphrase.or(from_env.as_deref());
    if file.is_protected() && passphrase.is_none() {
        anyhow::bail!(
            "{} key is passphrase protected; set {} or pass --passphrase",
            file.type_label(),
            PASSPHRASE_ENV
        );
    }
    file.to_key_pair(backend, passphrase)
        .context("Failed to load private key")
}

/// The public key behind a key file, decrypting private files as needed
pub async fn load_public_key(
    backend: &CryptoBackend,
    registry: &FormatRegistry,
    path: &Path,
) -> Result<PublicKey> {
    match load_key_file(backend, registry, path).await? {
        KeyFile::Public { key, .. } => Ok(key),
        KeyFile::Private(file) => Ok(unlock(backend, file.as_ref(), None)?
            .public_key()
            .clone()),
    }
}

/// Path of the `.pub` companion of a private key file
pub fn public_key_path(private: &Path) -> PathBuf {
    let mut path = private.to_path_buf();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.set_file_name(format!("{name}.pub"));
    path
}

/// Write secret material readable by the owner only
pub async fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options
        .open(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(contents).await?;
    file.flush().await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // `mode` only applies to newly created files
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    Ok(())
}

/// Signature bytes from a file holding either base64 text or the raw blob
pub fn decode_signature(contents: &[u8]) -> Vec<u8> {
    std::str::from_utf8(contents)
        .ok()
        .map(|text| {
            text.chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect::<String>()
        })
        .filter(|text| !text.is_empty())
        .and_then(|text| BASE64.decode(text).ok())
        .unwrap_or_else(|| contents.to_vec())
}

/// Human readable description of a public key or certificate
pub fn describe_public_key(
    backend: &CryptoBackend,
    key: &PublicKey,
    comment: Option<&str>,
) -> Vec<String> {
    let mut lines = vec![
        format!("Type: {}", key.algorithm_name()),
        format!("Bits: {}", key.bit_length()),
        format!("Security: {}", key.security_level()),
        format!("Fingerprint: {}", key.fingerprint()),
    ];
    if let Some(comment) = comment.filter(|c| !c.is_empty()) {
        lines.push(format!("Comment: {comment}"));
    }
    if let Some(cert) = key.as_certificate() {
        lines.extend(describe_certificate(backend, cert));
    }
    lines
}

fn describe_certificate(backend: &CryptoBackend, cert: &Certificate) -> Vec<String> {
    let mut lines = vec![
        format!("Certificate: {} certificate", cert.cert_type()),
        format!("Base key: {}", cert.base_key().fingerprint()),
        format!(
            "Signing CA: {} {}",
            cert.signature_key().algorithm_name(),
            cert.signature_key().fingerprint()
        ),
        format!("Key ID: \"{}\"", cert.key_id()),
        format!("Serial: {}", cert.serial()),
        format!(
            "Valid: from {} to {}",
            format_timestamp(cert.valid_after(), "always"),
            format_timestamp(cert.valid_before(), "forever")
        ),
    ];

    if cert.principals().is_empty() {
        lines.push("Principals: (none)".to_string());
    } else {
        lines.push("Principals:".to_string());
        lines.extend(cert.principals().iter().map(|p| format!("        {p}")));
    }

    for (title, options) in [
        ("Critical Options", cert.critical_options()),
        ("Extensions", cert.extensions()),
    ] {
        if options.is_empty() {
            lines.push(format!("{title}: (none)"));
            continue;
        }
        lines.push(format!("{title}:"));
        for option in options {
            match option.value() {
                Some(value) if !value.is_empty() => {
                    lines.push(format!("        {} {}", option.name, value))
                }
                _ => lines.push(format!("        {}", option.name)),
            }
        }
    }

    let ca_check = match cert.verify_ca_signature(backend) {
        Ok(true) => "valid".to_string(),
        Ok(false) => "INVALID".to_string(),
        Err(e) => format!("not checked ({e})"),
    };
    lines.push(format!("CA signature: {ca_check}"));
    lines
}

/// Render a certificate validity bound; `0` and `u64::MAX` are open ends
fn format_timestamp(seconds: u64, open: &str) -> String {
    if seconds == 0 || seconds == u64::MAX {
        return open.to_string();
    }
    i64::try_from(seconds)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|time| time.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_else(|| seconds.to_string())
}

/// Fingerprint in the requested hash
pub fn fingerprint_line(key: &PublicKey, md5: bool) -> String {
    let hash = if md5 { HashAlg::Md5 } else { HashAlg::Sha256 };
    format!(
        "{} {} ({})",
        key.bit_length(),
        key.fingerprint_with(hash),
        key.algorithm_name()
    )
}
