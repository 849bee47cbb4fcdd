//! Benchmarks for signing and verification

use std::hint::black_box;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use criterion::{criterion_group, criterion_main, Criterion};
use sshkey_core::keys::KeyGenSpec;
use sshkey_core::{CryptoBackend, EcdsaCurve, KeyPair, PublicKey, SshPublicKey};

const MESSAGE: &[u8] = b"interop message";

fn fixture(name: &str) -> String {
    let path = format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name);
    std::fs::read_to_string(&path).unwrap()
}

fn signature(signer: &str) -> Vec<u8> {
    let lines = fixture("signatures.txt");
    let line = lines
        .lines()
        .find(|line| line.split_whitespace().next() == Some(signer))
        .unwrap();
    BASE64.decode(line.split_whitespace().nth(1).unwrap()).unwrap()
}

fn bench_verify(c: &mut Criterion) {
    let backend = CryptoBackend::default();
    let mut group = c.benchmark_group("verify");

    for (key_file, signer) in [
        ("ed25519.pub", "ed25519"),
        ("ecdsa256_enc.pub", "ecdsa256_plain"),
        ("ecdsa384.pub", "ecdsa384"),
        ("ecdsa521.pub", "ecdsa521"),
        ("rsa.pub", "rsa"),
        ("dsa.pub", "dsa"),
    ] {
        let key = PublicKey::from_openssh(&backend, &fixture(key_file)).unwrap();
        let sig = signature(signer);
        group.bench_function(signer, |b| {
            b.iter(|| key.verify(&backend, black_box(&sig), black_box(MESSAGE)).unwrap());
        });
    }

    let cert = PublicKey::from_openssh(&backend, &fixture("rsa-cert.pub")).unwrap();
    let cert = cert.as_certificate().unwrap().clone();
    group.bench_function("certificate_ca", |b| {
        b.iter(|| cert.verify_ca_signature(&backend).unwrap());
    });

    group.finish();
}

fn bench_sign(c: &mut Criterion) {
    let backend = CryptoBackend::default();
    let mut group = c.benchmark_group("sign");

    for (label, spec) in [
        ("ed25519", KeyGenSpec::Ed25519),
        ("ecdsa256", KeyGenSpec::Ecdsa(EcdsaCurve::NistP256)),
        ("ecdsa521", KeyGenSpec::Ecdsa(EcdsaCurve::NistP521)),
    ] {
        let pair = KeyPair::generate(&backend, spec).unwrap();
        group.bench_function(label, |b| {
            b.iter(|| pair.sign(&backend, black_box(MESSAGE)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_verify, bench_sign);
criterion_main!(benches);
