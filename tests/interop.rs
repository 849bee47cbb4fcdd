//! Keys and signatures produced by OpenSSH and OpenSSL

mod common;

use common::*;
use pretty_assertions::assert_eq;
use rstest::rstest;
use sshkey_core::encoding::{Mpint, Reader, Writer};
use sshkey_core::keys::{BackendPolicy, HashAlg, SignatureBlob};
use sshkey_core::{CryptoBackend, Error, KeyAlgorithm, SecurityLevel, SshPublicKey};

#[rstest]
#[case("ed25519", "ed25519.pub")]
#[case("ecdsa256_plain", "ecdsa256_enc.pub")]
#[case("ecdsa384", "ecdsa384.pub")]
#[case("ecdsa521", "ecdsa521.pub")]
#[case("rsa_sha1", "rsa.pub")]
#[case("rsa", "rsa.pub")]
#[case("dsa", "dsa.pub")]
fn test_openssh_signatures_verify(#[case] signer: &str, #[case] key_file: &str) {
    let backend = CryptoBackend::default();
    let key = public_key(&backend, key_file);
    let signature = &signatures()[signer];

    assert!(key.verify(&backend, signature, INTEROP_MESSAGE).unwrap());
    assert!(!key
        .verify(&backend, signature, b"a different message")
        .unwrap());
}

#[rstest]
#[case("ed25519", "ecdsa256_enc.pub")]
#[case("rsa", "ecdsa384.pub")]
#[case("ecdsa384", "ecdsa521.pub")]
fn test_signature_for_other_algorithm(#[case] signer: &str, #[case] key_file: &str) {
    let backend = CryptoBackend::default();
    let key = public_key(&backend, key_file);
    let err = key
        .verify(&backend, &signatures()[signer], INTEROP_MESSAGE)
        .unwrap_err();
    assert!(matches!(err, Error::SignatureAlgorithmMismatch { .. }), "{err}");
}

#[test]
fn test_legacy_layout_accepted() {
    let backend = CryptoBackend::default();
    for (signer, key_file) in [("ecdsa256_plain", "ecdsa256_enc.pub"), ("rsa_sha1", "rsa.pub")] {
        let key = public_key(&backend, key_file);
        let signatures = signatures();
        let blob = SignatureBlob::parse(&signatures[signer]).unwrap();
        let legacy = SignatureBlob::encode_legacy(blob.raw);
        assert!(key.verify(&backend, &legacy, INTEROP_MESSAGE).unwrap(), "{signer}");
    }
}

/// Rebuild an ECDSA signature with bit `bit` of `s` flipped
fn flip_s_bit(raw: &[u8], bit: usize) -> Vec<u8> {
    let mut reader = Reader::new(raw);
    let r = reader.read_mpint().unwrap();
    let s = reader.read_mpint().unwrap();
    let mut s = s.as_positive_bytes().unwrap().to_vec();
    let index = s.len() - 1 - bit / 8;
    s[index] ^= 1 << (bit % 8);

    let mut writer = Writer::new();
    writer
        .write_mpint(&r)
        .write_mpint(&Mpint::from_positive_bytes(&s));
    writer.into_bytes()
}

#[rstest]
#[case("ecdsa256_plain", "ecdsa256_enc.pub")]
#[case("ecdsa384", "ecdsa384.pub")]
#[case("ecdsa521", "ecdsa521.pub")]
fn test_flipped_s_bit_is_false_not_error(#[case] signer: &str, #[case] key_file: &str) {
    let backend = CryptoBackend::default();
    let key = public_key(&backend, key_file);
    let signatures = signatures();
    let blob = SignatureBlob::parse(&signatures[signer]).unwrap();
    let name = key.algorithm_name();

    let mut reader = Reader::new(blob.raw);
    reader.read_mpint().unwrap();
    let s_bits = reader.read_mpint().unwrap().as_positive_bytes().unwrap().len() * 8;

    for bit in 0..s_bits {
        let raw = flip_s_bit(blob.raw, bit);
        for signature in [
            SignatureBlob::encode(name, &raw),
            SignatureBlob::encode_legacy(&raw),
        ] {
            match key.verify(&backend, &signature, INTEROP_MESSAGE) {
                Ok(false) => {}
                other => panic!("{signer}: bit {bit} of s gave {other:?}"),
            }
        }
    }
}

#[test]
fn test_garbled_signature_name_is_mismatch() {
    let backend = CryptoBackend::default();
    let key = public_key(&backend, "ecdsa256_enc.pub");
    let signatures = signatures();
    let blob = SignatureBlob::parse(&signatures["ecdsa256_plain"]).unwrap();

    let mut writer = Writer::new();
    writer
        .write_binary_string(&[0xff, 0xfe, 0x00])
        .write_binary_string(blob.raw);
    let err = key
        .verify(&backend, &writer.into_bytes(), INTEROP_MESSAGE)
        .unwrap_err();
    assert!(matches!(err, Error::SignatureAlgorithmMismatch { .. }), "{err}");
}

#[test]
fn test_sha1_policy() {
    let backend = CryptoBackend::new(BackendPolicy {
        allow_sha1_signatures: false,
        ..BackendPolicy::default()
    });
    let signatures = signatures();
    let rsa = public_key(&backend, "rsa.pub");
    assert!(matches!(
        rsa.verify(&backend, &signatures["rsa_sha1"], INTEROP_MESSAGE),
        Err(Error::PolicyViolation(_))
    ));
    assert!(rsa
        .verify(&backend, &signatures["rsa"], INTEROP_MESSAGE)
        .unwrap());
}

#[test]
fn test_minimum_rsa_size_policy() {
    let backend = CryptoBackend::new(BackendPolicy {
        min_rsa_bits: 3072,
        ..BackendPolicy::default()
    });
    let rsa = public_key(&backend, "rsa.pub");
    assert!(matches!(
        rsa.verify(&backend, &signatures()["rsa"], INTEROP_MESSAGE),
        Err(Error::PolicyViolation(_))
    ));
}

#[rstest]
#[case("ed25519.pub", "SHA256:vcKqtLz6k38rs0ZItobNMMjjoVSMC9vPtnlqubvCryY")]
#[case("ecdsa256_enc.pub", "SHA256:xXj/nrvqYp/o3zpl568Km8/TWmBRubqOkOK5EqkKIoU")]
#[case("ecdsa256_gcm.pub", "SHA256:JlGoBIyP7PgpogFDrYj3Re8wM/6kVdnBj+aLbigcVYw")]
#[case("ecdsa384.pub", "SHA256:ZrZdRRgJNZ8biQXXl+zGUKh7KVjUy0dhIydI8hQVFnI")]
#[case("ecdsa521.pub", "SHA256:SjX31RGsbFtQ/q7RbjPvYuhtLWJqfsNxFy3iUNyPJlc")]
#[case("rsa.pub", "SHA256:5H6froEteCw7SVSOlzdox1A6oQDnNFhE0PuoFAclEi0")]
#[case("dsa.pub", "SHA256:oAF+e80I9D7ZvMPjYAJJcD5qlh2UtucX4M4lfzeansA")]
#[case("ca.pub", "SHA256:MNulXHCkZS1ssNYAgNk+mZTePWQSJmF7vozeMl/FGco")]
fn test_fingerprints_match_ssh_keygen(#[case] file: &str, #[case] expected: &str) {
    let backend = CryptoBackend::default();
    assert_eq!(public_key(&backend, file).fingerprint(), expected);
}

#[rstest]
#[case("ed25519.pub", "MD5:8c:5f:31:a0:3f:d3:bd:07:0e:ef:3e:49:96:d2:4e:22")]
#[case("ecdsa256_enc.pub", "MD5:15:07:0e:65:34:e2:ed:7c:17:7f:81:ce:f9:42:f2:50")]
#[case("rsa.pub", "MD5:10:e3:63:a7:ff:d8:99:eb:2d:1f:67:7a:b6:f6:b3:94")]
fn test_md5_fingerprints(#[case] file: &str, #[case] expected: &str) {
    let backend = CryptoBackend::default();
    assert_eq!(
        public_key(&backend, file).fingerprint_with(HashAlg::Md5),
        expected
    );
}

#[rstest]
#[case("ed25519.pub", KeyAlgorithm::Ed25519, 256, SecurityLevel::Strong)]
#[case("ecdsa384.pub", KeyAlgorithm::Ecdsa(sshkey_core::EcdsaCurve::NistP384), 384, SecurityLevel::Paranoid)]
#[case("ecdsa521.pub", KeyAlgorithm::Ecdsa(sshkey_core::EcdsaCurve::NistP521), 521, SecurityLevel::Paranoid)]
#[case("rsa.pub", KeyAlgorithm::Rsa, 2048, SecurityLevel::Medium)]
#[case("dsa.pub", KeyAlgorithm::Dsa, 1024, SecurityLevel::Weak)]
fn test_key_properties(
    #[case] file: &str,
    #[case] algorithm: KeyAlgorithm,
    #[case] bits: usize,
    #[case] level: SecurityLevel,
) {
    let backend = CryptoBackend::default();
    let key = public_key(&backend, file);
    assert_eq!(key.algorithm(), algorithm);
    assert_eq!(key.bit_length(), bits);
    assert_eq!(key.security_level(), level);
}

#[rstest]
#[case("ed25519.pub")]
#[case("ecdsa521.pub")]
#[case("rsa.pub")]
#[case("dsa.pub")]
fn test_text_form_round_trip(#[case] file: &str) {
    let backend = CryptoBackend::default();
    let line = fixture_text(file);
    let (key, comment) =
        sshkey_core::PublicKey::from_openssh_with_comment(&backend, &line).unwrap();
    let rendered = key.to_openssh_with_comment(comment.as_deref().unwrap_or(""));
    assert_eq!(rendered, line.trim());
}

#[test]
fn test_name_mismatch_in_text_form() {
    let backend = CryptoBackend::default();
    let line = fixture_text("ed25519.pub").replacen("ssh-ed25519", "ssh-rsa", 1);
    assert!(matches!(
        sshkey_core::PublicKey::from_openssh(&backend, &line),
        Err(Error::MalformedKey { .. })
    ));
}
