//! Private key containers written by ssh-keygen and openssl

mod common;

use common::*;
use pretty_assertions::assert_eq;
use rstest::rstest;
use sshkey_core::formats::{Cipher, OpenSshKeyFile, OpenSshOptions, Pkcs8KeyFile};
use sshkey_core::keys::KeyGenSpec;
use sshkey_core::{CryptoBackend, Error, FormatRegistry, KeyPair, PrivateKeyFile, SshPublicKey};

#[rstest]
#[case("ed25519", "user@example")]
#[case("ecdsa384", "root@vm")]
#[case("ecdsa521", "root@vm")]
#[case("rsa", "root@vm")]
#[case("dsa", "root@vm")]
fn test_unencrypted_openssh_fixtures(#[case] name: &str, #[case] comment: &str) {
    let backend = CryptoBackend::default();
    let bytes = fixture(name);
    let file = FormatRegistry::default().parse(&backend, &bytes).unwrap();

    assert_eq!(file.type_label(), "OpenSSH");
    assert!(!file.is_protected());
    assert_eq!(file.comment(), Some(comment));
    assert_eq!(file.formatted_bytes(), bytes);

    let pair = file.to_key_pair(&backend, None).unwrap();
    assert_eq!(pair.comment(), comment);
    let expected = public_key(&backend, &format!("{name}.pub"));
    assert_eq!(pair.public_key(), &expected);

    let signature = pair.sign(&backend, INTEROP_MESSAGE).unwrap();
    assert!(expected.verify(&backend, &signature, INTEROP_MESSAGE).unwrap());
}

#[rstest]
#[case("ed25519")]
#[case("rsa")]
#[case("dsa")]
fn test_reserialization_reproduces_input(#[case] name: &str) {
    let backend = CryptoBackend::default();
    let text = fixture_text(name);
    let file = OpenSshKeyFile::parse(&backend, text.as_bytes()).unwrap();
    assert_eq!(file.to_pem(), text);
}

#[rstest]
#[case("ecdsa256_enc", Cipher::Aes256Ctr, "ecdsa@example")]
#[case("ecdsa256_gcm", Cipher::Aes256Gcm, "gcm@example")]
fn test_encrypted_openssh_fixtures(
    #[case] name: &str,
    #[case] cipher: Cipher,
    #[case] comment: &str,
) {
    let backend = CryptoBackend::default();
    let file = OpenSshKeyFile::parse(&backend, &fixture(name)).unwrap();

    assert!(file.is_protected());
    assert_eq!(file.cipher(), cipher);
    assert_eq!(file.comment(), None);
    assert_eq!(file.public_key(), &public_key(&backend, &format!("{name}.pub")));

    assert!(matches!(
        file.to_key_pair(&backend, None),
        Err(Error::InvalidPassphrase)
    ));
    assert!(matches!(
        file.to_key_pair(&backend, Some("battery staple")),
        Err(Error::InvalidPassphrase)
    ));

    let pair = file.to_key_pair(&backend, Some(OPENSSH_PASSPHRASE)).unwrap();
    assert_eq!(pair.comment(), comment);
    assert_eq!(pair.public_key(), file.public_key());
}

#[test]
fn test_change_passphrase_on_fixture() {
    let backend = CryptoBackend::default();
    let mut file = OpenSshKeyFile::parse(&backend, &fixture("ecdsa256_enc")).unwrap();
    let original = file.to_key_pair(&backend, Some(OPENSSH_PASSPHRASE)).unwrap();

    assert!(matches!(
        file.change_passphrase(&backend, Some("wrong"), Some("new")),
        Err(Error::InvalidPassphrase)
    ));
    file.change_passphrase(&backend, Some(OPENSSH_PASSPHRASE), Some("new"))
        .unwrap();
    assert_eq!(file.cipher(), Cipher::Aes256Ctr);
    assert_ne!(file.formatted_bytes(), fixture("ecdsa256_enc"));

    let reparsed = OpenSshKeyFile::parse(&backend, &file.formatted_bytes()).unwrap();
    let pair = reparsed.to_key_pair(&backend, Some("new")).unwrap();
    assert_eq!(pair, original);
    assert_eq!(pair.comment(), "ecdsa@example");
}

#[rstest]
#[case("pkcs8_ed25519.pem")]
#[case("pkcs8_p256.pem")]
#[case("pkcs8_rsa.pem")]
fn test_pkcs8_fixtures(#[case] name: &str) {
    let backend = CryptoBackend::default();
    let bytes = fixture(name);
    let mut file = FormatRegistry::default().parse(&backend, &bytes).unwrap();

    assert_eq!(file.type_label(), "PKCS#8");
    assert!(!file.is_protected());
    assert_eq!(file.comment(), None);
    assert_eq!(file.formatted_bytes(), bytes);

    let pair = file.to_key_pair(&backend, None).unwrap();
    assert_eq!(pair.public_key(), &public_key(&backend, &format!("{name}.pub")));

    assert!(!file.supports_passphrase_change());
    assert!(matches!(
        file.change_passphrase(&backend, None, Some("x")),
        Err(Error::ReadOnlyFormat(_))
    ));
}

#[test]
fn test_encrypted_pkcs8_fixture() {
    let backend = CryptoBackend::default();
    let file = Pkcs8KeyFile::parse(&fixture("pkcs8_p256_enc.pem")).unwrap();
    assert!(file.is_protected());
    assert!(matches!(
        file.to_key_pair(&backend, Some("closed sesame")),
        Err(Error::InvalidPassphrase)
    ));

    let pair = file.to_key_pair(&backend, Some(PKCS8_PASSPHRASE)).unwrap();
    assert_eq!(
        pair.public_key(),
        &public_key(&backend, "pkcs8_p256.pem.pub")
    );
}

#[test]
fn test_pkcs8_fingerprints() {
    let backend = CryptoBackend::default();
    for (name, expected) in [
        ("pkcs8_ed25519.pem", "SHA256:XHkbr94XCO1wHsqDYR+qTm+G4oGd9I+LGVWriGQgNeM"),
        ("pkcs8_p256.pem", "SHA256:3By6CcuVKbOlNa6jgHooGVlIH7RBFWO8lfN/35UjUWw"),
        ("pkcs8_rsa.pem", "SHA256:Cr0G2lVsUnHyvIj5DPUGqdvdIX8Y1DN8VOEVnsxup+U"),
    ] {
        let file = Pkcs8KeyFile::parse(&fixture(name)).unwrap();
        let pair = file.to_key_pair(&backend, None).unwrap();
        assert_eq!(pair.public_key().fingerprint(), expected, "{name}");
    }
}

#[rstest]
#[case(KeyGenSpec::Ed25519, Cipher::Aes256Ctr)]
#[case(KeyGenSpec::Ecdsa(sshkey_core::EcdsaCurve::NistP521), Cipher::Aes256Gcm)]
#[case(KeyGenSpec::Rsa { bits: 1024 }, Cipher::Aes256Ctr)]
fn test_generated_key_lifecycle(#[case] spec: KeyGenSpec, #[case] cipher: Cipher) {
    let backend = CryptoBackend::default();
    let pair = KeyPair::generate(&backend, spec).unwrap().with_comment("gen@test");
    let options = OpenSshOptions {
        cipher,
        kdf_rounds: 2,
    };

    let mut file = OpenSshKeyFile::create(&backend, &pair, Some("first"), &options).unwrap();
    let loaded = FormatRegistry::default()
        .parse(&backend, &file.formatted_bytes())
        .unwrap()
        .to_key_pair(&backend, Some("first"))
        .unwrap();
    assert_eq!(loaded, pair);
    assert_eq!(loaded.comment(), "gen@test");

    file.change_passphrase(&backend, Some("first"), None).unwrap();
    assert!(!file.is_protected());
    assert_eq!(file.comment(), Some("gen@test"));
    file.change_passphrase(&backend, None, Some("second")).unwrap();
    assert!(file.is_protected());
    // Protection added back uses the default cipher
    assert_eq!(file.cipher(), Cipher::Aes256Ctr);
    assert_eq!(file.to_key_pair(&backend, Some("second")).unwrap(), pair);
}

#[test]
fn test_corrupted_container() {
    let backend = CryptoBackend::default();
    let text = fixture_text("ed25519");
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    lines.truncate(lines.len() - 3);
    lines.push("-----END OPENSSH PRIVATE KEY-----".to_string());
    let err = OpenSshKeyFile::parse(&backend, lines.join("\n").as_bytes()).unwrap_err();
    assert!(matches!(err, Error::MalformedKey { .. }), "{err}");
}
