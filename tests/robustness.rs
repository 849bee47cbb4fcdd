//! Hostile and truncated input never panics and fails with a typed error

mod common;

use common::*;
use proptest::prelude::*;
use sshkey_core::encoding::{Mpint, Reader, Writer};
use sshkey_core::keys::SignatureBlob;
use sshkey_core::{CryptoBackend, Error, FormatRegistry, PublicKey, SshPublicKey};

const PUBLIC_FIXTURES: &[&str] = &[
    "ed25519.pub",
    "ecdsa256_enc.pub",
    "ecdsa521.pub",
    "rsa.pub",
    "dsa.pub",
    "ecdsa256_enc-cert.pub",
    "rsa-cert.pub",
    "dsa-cert.pub",
];

#[test]
fn test_every_truncation_of_public_blobs() {
    let backend = CryptoBackend::default();
    for name in PUBLIC_FIXTURES {
        let blob = public_key(&backend, name).to_blob();
        for cut in 0..blob.len() {
            let err = PublicKey::from_blob(&backend, &blob[..cut])
                .expect_err(&format!("{name} cut at {cut}"));
            assert!(err.is_truncation(), "{name} cut at {cut}: {err}");
        }
    }
}

#[test]
fn test_trailing_bytes_rejected() {
    let backend = CryptoBackend::default();
    let mut blob = public_key(&backend, "ed25519.pub").to_blob();
    blob.push(0);
    assert!(matches!(
        PublicKey::from_blob(&backend, &blob),
        Err(Error::MalformedKey { .. })
    ));
}

#[test]
fn test_every_truncation_of_signatures() {
    for (name, signature) in signatures() {
        for cut in 0..signature.len() {
            let result = SignatureBlob::parse(&signature[..cut]);
            // A cut can land exactly on a legacy-layout boundary
            if let Err(err) = result {
                assert!(
                    matches!(err, Error::TruncatedInput { .. } | Error::MalformedSignature(_)),
                    "{name} cut at {cut}: {err}"
                );
            }
        }
    }
}

#[test]
fn test_truncated_signature_does_not_verify() {
    let backend = CryptoBackend::default();
    let key = public_key(&backend, "ecdsa256_enc.pub");
    let signature = &signatures()["ecdsa256_plain"];
    for cut in 0..signature.len() {
        let verified = key.verify(&backend, &signature[..cut], INTEROP_MESSAGE);
        assert!(!matches!(verified, Ok(true)), "cut at {cut}");
    }
}

#[test]
fn test_truncated_private_files() {
    let backend = CryptoBackend::default();
    let registry = FormatRegistry::default();
    for name in ["ed25519", "ecdsa256_gcm", "pkcs8_p256.pem"] {
        let text = fixture_text(name);
        for cut in (0..text.len()).step_by(7) {
            // Any outcome but a panic is acceptable for the registry
            let _ = registry.parse(&backend, &text.as_bytes()[..cut]);
        }
    }
}

proptest! {
    #[test]
    fn prop_public_blob_never_panics(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        let backend = CryptoBackend::default();
        let _ = PublicKey::from_blob(&backend, &data);
    }

    #[test]
    fn prop_named_prefix_then_garbage(
        name in prop::sample::select(vec![
            "ssh-rsa",
            "ssh-dss",
            "ecdsa-sha2-nistp256",
            "ssh-ed25519",
            "ssh-ed25519-cert-v01@openssh.com",
            "ecdsa-sha2-nistp384-cert-v01@openssh.com",
        ]),
        tail in proptest::collection::vec(any::<u8>(), 0..200),
    ) {
        let backend = CryptoBackend::default();
        let mut writer = Writer::new();
        writer.write_string(name).write_raw(&tail);
        prop_assert!(PublicKey::from_blob(&backend, &writer.into_bytes()).is_err() || !tail.is_empty());
    }

    #[test]
    fn prop_signature_parse_never_panics(data in proptest::collection::vec(any::<u8>(), 0..128)) {
        let backend = CryptoBackend::default();
        let key = public_key(&backend, "ed25519.pub");
        let _ = SignatureBlob::parse(&data);
        prop_assert!(!matches!(key.verify(&backend, &data, b"m"), Ok(true)));
    }

    #[test]
    fn prop_registry_never_panics(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        let backend = CryptoBackend::default();
        let _ = FormatRegistry::default().parse(&backend, &data);
    }

    #[test]
    fn prop_huge_declared_length_is_truncation(len in 5u32.., body in proptest::collection::vec(any::<u8>(), 0..4)) {
        let mut writer = Writer::new();
        writer.write_u32(len).write_raw(&body);
        let bytes = writer.into_bytes();
        let mut reader = Reader::new(&bytes);
        let err = reader.read_binary_string().unwrap_err();
        prop_assert!(
            matches!(err, Error::TruncatedInput { needed, remaining } if needed == len as usize && remaining == body.len()),
            "unexpected error for {}", len
        );
    }

    #[test]
    fn prop_mpint_wire_form_is_minimal(raw in proptest::collection::vec(any::<u8>(), 0..48)) {
        let value = Mpint::from_bytes(&raw);
        let mut writer = Writer::new();
        writer.write_mpint(&value);
        let bytes = writer.into_bytes();
        let decoded = Reader::new(&bytes).read_mpint().unwrap();
        prop_assert_eq!(decoded.as_bytes(), value.as_bytes());
        prop_assert!(value.as_bytes().len() <= raw.len());
    }
}
