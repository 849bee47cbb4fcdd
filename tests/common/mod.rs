//! Fixture helpers shared by the integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sshkey_core::{CryptoBackend, PublicKey};

/// Message every fixture signature was made over
pub const INTEROP_MESSAGE: &[u8] = b"interop message";

/// Passphrase of the encrypted OpenSSH fixtures
pub const OPENSSH_PASSPHRASE: &str = "correct horse";

/// Passphrase of `pkcs8_p256_enc.pem`
pub const PKCS8_PASSPHRASE: &str = "open sesame";

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn fixture(name: &str) -> Vec<u8> {
    std::fs::read(fixture_path(name)).unwrap_or_else(|e| panic!("fixture {name}: {e}"))
}

pub fn fixture_text(name: &str) -> String {
    String::from_utf8(fixture(name)).unwrap()
}

pub fn public_key(backend: &CryptoBackend, name: &str) -> PublicKey {
    PublicKey::from_openssh(backend, &fixture_text(name)).unwrap()
}

/// `signatures.txt`: signer name to signature blob
pub fn signatures() -> HashMap<String, Vec<u8>> {
    fixture_text("signatures.txt")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let (name, encoded) = line.split_once(' ').unwrap();
            (name.to_string(), BASE64.decode(encoded.trim()).unwrap())
        })
        .collect()
}
