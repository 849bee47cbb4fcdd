//! Private key material

use std::fmt;

use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::BigUint;
use tracing::{debug, instrument};
use zeroize::Zeroizing;

use super::algorithm::{EcdsaCurve, KeyAlgorithm, RsaHash};
use super::backend::CryptoBackend;
use super::dsa::DsaPublicKey;
use super::ecdsa::EcdsaPublicKey;
use super::ed25519::{Ed25519PublicKey, PUBLIC_KEY_LEN};
use super::public::{PublicKey, SshPublicKey};
use super::rsa::RsaPublicKey;
use super::signature::SignatureBlob;
use crate::encoding::{Mpint, Reader, Writer};
use crate::{Error, Result};

pub const DEFAULT_RSA_BITS: usize = 3072;
pub const MIN_RSA_BITS: usize = 1024;

/// What kind of key [`KeyPair::generate`] should make
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyGenSpec {
    #[default]
    Ed25519,
    Ecdsa(EcdsaCurve),
    Rsa { bits: usize },
}

impl KeyGenSpec {
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::Ed25519 => KeyAlgorithm::Ed25519,
            Self::Ecdsa(curve) => KeyAlgorithm::Ecdsa(*curve),
            Self::Rsa { .. } => KeyAlgorithm::Rsa,
        }
    }

    /// Spec for `algorithm`, using `rsa_bits` when it is RSA
    pub fn for_algorithm(algorithm: KeyAlgorithm, rsa_bits: usize) -> Result<Self> {
        match algorithm {
            KeyAlgorithm::Ed25519 => Ok(Self::Ed25519),
            KeyAlgorithm::Ecdsa(curve) => Ok(Self::Ecdsa(curve)),
            KeyAlgorithm::Rsa => Ok(Self::Rsa { bits: rsa_bits }),
            KeyAlgorithm::Dsa => Err(Error::UnsupportedAlgorithm(
                "DSA key generation is not offered".into(),
            )),
        }
    }
}

#[derive(Clone)]
enum Secret {
    Rsa(Box<rsa::RsaPrivateKey>),
    Dsa { x: Zeroizing<Mpint> },
    Ecdsa { scalar: Zeroizing<Vec<u8>> },
    Ed25519 { seed: Zeroizing<[u8; 32]> },
}

/// A public key together with its private half and a comment
#[derive(Clone)]
pub struct KeyPair {
    public: PublicKey,
    secret: Secret,
    comment: String,
}

impl KeyPair {
    /// Generate a fresh key pair
    #[instrument(skip_all, fields(algorithm = %spec.algorithm()))]
    pub fn generate(backend: &CryptoBackend, spec: KeyGenSpec) -> Result<Self> {
        let pair = match spec {
            KeyGenSpec::Ed25519 => {
                let mut seed = Zeroizing::new([0u8; 32]);
                backend.fill_random(&mut seed[..])?;
                Self::from_ed25519_seed(backend, seed)?
            }
            KeyGenSpec::Ecdsa(curve) => {
                let (scalar, point) = backend.generate_ecdsa(curve);
                Self {
                    public: EcdsaPublicKey::new(backend, curve, point)?.into(),
                    secret: Secret::Ecdsa { scalar },
                    comment: String::new(),
                }
            }
            KeyGenSpec::Rsa { bits } => {
                let floor = MIN_RSA_BITS.max(backend.policy().min_rsa_bits);
                if bits < floor {
                    return Err(Error::PolicyViolation(format!(
                        "refusing to generate a {bits}-bit RSA key, minimum is {floor}"
                    )));
                }
                Self::from_rsa(backend.generate_rsa(bits)?)?
            }
        };
        debug!(fingerprint = %pair.public.fingerprint(), "generated key pair");
        Ok(pair)
    }

    pub(crate) fn from_ed25519_seed(
        backend: &CryptoBackend,
        seed: Zeroizing<[u8; 32]>,
    ) -> Result<Self> {
        let public = backend.ed25519_public_from_seed(&seed[..])?;
        Ok(Self {
            public: Ed25519PublicKey::new(public).into(),
            secret: Secret::Ed25519 { seed },
            comment: String::new(),
        })
    }

    /// `scalar` is the unsigned big-endian private value
    pub(crate) fn from_ecdsa_scalar(
        backend: &CryptoBackend,
        curve: EcdsaCurve,
        scalar: &[u8],
    ) -> Result<Self> {
        let scalar =
            Zeroizing::new(Mpint::from_positive_bytes(scalar).to_fixed_width(curve.field_size())?);
        let point = backend.ecdsa_public_from_scalar(curve, &scalar)?;
        Ok(Self {
            public: EcdsaPublicKey::new(backend, curve, point)?.into(),
            secret: Secret::Ecdsa { scalar },
            comment: String::new(),
        })
    }

    pub(crate) fn from_rsa(key: rsa::RsaPrivateKey) -> Result<Self> {
        let public = RsaPublicKey::new(
            Mpint::from_positive_bytes(&key.e().to_bytes_be()),
            Mpint::from_positive_bytes(&key.n().to_bytes_be()),
        )?;
        Ok(Self {
            public: public.into(),
            secret: Secret::Rsa(Box::new(key)),
            comment: String::new(),
        })
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.public.algorithm()
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.set_comment(comment);
        self
    }

    /// Sign `message`, returning a signature blob in the named layout.
    ///
    /// RSA keys sign with `rsa-sha2-512`.
    pub fn sign(&self, backend: &CryptoBackend, message: &[u8]) -> Result<Vec<u8>> {
        self.sign_with(backend, RsaHash::Sha512, message)
    }

    /// Sign with an explicit RSA digest; other algorithms ignore `hash`.
    pub fn sign_with(
        &self,
        backend: &CryptoBackend,
        hash: RsaHash,
        message: &[u8],
    ) -> Result<Vec<u8>> {
        match (&self.secret, &self.public) {
            (Secret::Ed25519 { seed }, PublicKey::Ed25519(public)) => {
                let raw = backend.sign_ed25519(&seed[..], public.as_bytes(), message)?;
                Ok(SignatureBlob::encode(KeyAlgorithm::Ed25519.name(), &raw))
            }
            (Secret::Ecdsa { scalar }, PublicKey::Ecdsa(public)) => {
                let raw = backend.sign_ecdsa(public.curve(), scalar, message)?;
                Ok(SignatureBlob::encode(public.algorithm_name(), &raw))
            }
            (Secret::Rsa(key), PublicKey::Rsa(_)) => {
                let raw = backend.sign_rsa(key, hash, message)?;
                Ok(SignatureBlob::encode(hash.signature_name(), &raw))
            }
            (Secret::Dsa { x }, PublicKey::Dsa(public)) => {
                let verifying_key = public.verifying_key(backend)?;
                let signing_key = backend.dsa_signing_key(verifying_key, x.as_positive_bytes()?)?;
                let raw = backend.sign_dsa(&signing_key, message)?;
                Ok(SignatureBlob::encode(KeyAlgorithm::Dsa.name(), &raw))
            }
            _ => Err(Error::malformed("private key does not match its public key")),
        }
    }

    /// Write the key type and private fields of the OpenSSH private section
    pub(crate) fn encode_private(&self, writer: &mut Writer) -> Result<()> {
        writer.write_string(self.public.algorithm_name());
        match (&self.secret, &self.public) {
            (Secret::Ed25519 { seed }, PublicKey::Ed25519(public)) => {
                let mut keypair = Zeroizing::new(Vec::with_capacity(64));
                keypair.extend_from_slice(&seed[..]);
                keypair.extend_from_slice(public.as_bytes());
                writer
                    .write_binary_string(public.as_bytes())
                    .write_binary_string(&keypair);
            }
            (Secret::Ecdsa { scalar }, PublicKey::Ecdsa(public)) => {
                let d = Zeroizing::new(Mpint::from_positive_bytes(scalar));
                writer
                    .write_string(public.curve().identifier())
                    .write_binary_string(public.point())
                    .write_mpint(&d);
            }
            (Secret::Rsa(key), PublicKey::Rsa(public)) => {
                let [p, q] = key.primes() else {
                    return Err(Error::UnsupportedAlgorithm(
                        "multi-prime RSA keys".into(),
                    ));
                };
                let iqmp = key
                    .crt_coefficient()
                    .ok_or_else(|| Error::malformed("RSA key has no CRT coefficient"))?;
                writer
                    .write_mpint(public.modulus())
                    .write_mpint(public.exponent())
                    .write_mpint(&secret_mpint(key.d()))
                    .write_mpint(&secret_mpint(&iqmp))
                    .write_mpint(&secret_mpint(p))
                    .write_mpint(&secret_mpint(q));
            }
            (Secret::Dsa { x }, PublicKey::Dsa(public)) => {
                public.encode_fields(writer);
                writer.write_mpint(x);
            }
            _ => return Err(Error::malformed("private key does not match its public key")),
        }
        Ok(())
    }

    /// Read the key type and private fields of the OpenSSH private section,
    /// checking that the private half matches the public half.
    pub(crate) fn decode_private(backend: &CryptoBackend, reader: &mut Reader<'_>) -> Result<Self> {
        let name = reader.read_string()?;
        let (algorithm, is_certificate) = KeyAlgorithm::from_name(name)?;
        if is_certificate {
            return Err(Error::UnsupportedFormat(format!(
                "private section holds a certificate ({name})"
            )));
        }

        match algorithm {
            KeyAlgorithm::Ed25519 => {
                let public = Ed25519PublicKey::decode_fields(reader)?;
                let keypair = reader.read_binary_string()?;
                if keypair.len() != 2 * PUBLIC_KEY_LEN {
                    return Err(Error::malformed(format!(
                        "Ed25519 private key must be 64 bytes, got {}",
                        keypair.len()
                    )));
                }
                let (seed, embedded) = keypair.split_at(PUBLIC_KEY_LEN);
                let mut seed_bytes = Zeroizing::new([0u8; 32]);
                seed_bytes.copy_from_slice(seed);
                let pair = Self::from_ed25519_seed(backend, seed_bytes)?;
                if embedded != public.as_bytes() || pair.public != PublicKey::Ed25519(public) {
                    return Err(Error::malformed("Ed25519 seed does not match its public key"));
                }
                Ok(pair)
            }
            KeyAlgorithm::Ecdsa(curve) => {
                let public = EcdsaPublicKey::decode_fields(backend, reader, curve)?;
                let d = Zeroizing::new(reader.read_mpint()?);
                let pair = Self::from_ecdsa_scalar(backend, curve, d.as_positive_bytes()?)?;
                if pair.public != PublicKey::Ecdsa(public) {
                    return Err(Error::malformed("ECDSA private scalar does not match its point"));
                }
                Ok(pair)
            }
            KeyAlgorithm::Rsa => {
                let n = reader.read_mpint()?;
                let e = reader.read_mpint()?;
                let d = Zeroizing::new(reader.read_mpint()?);
                let iqmp = Zeroizing::new(reader.read_mpint()?);
                let p = Zeroizing::new(reader.read_mpint()?);
                let q = Zeroizing::new(reader.read_mpint()?);

                let key = rsa::RsaPrivateKey::from_components(
                    to_biguint(&n)?,
                    to_biguint(&e)?,
                    to_biguint(&d)?,
                    vec![to_biguint(&p)?, to_biguint(&q)?],
                )
                .map_err(|err| Error::malformed(format!("invalid RSA private key: {err}")))?;
                key.validate()
                    .map_err(|err| Error::malformed(format!("inconsistent RSA private key: {err}")))?;
                if key.crt_coefficient() != Some(to_biguint(&iqmp)?) {
                    return Err(Error::malformed("RSA iqmp does not match p and q"));
                }
                Self::from_rsa(key)
            }
            KeyAlgorithm::Dsa => {
                let public = DsaPublicKey::decode_fields(backend, reader)?;
                let x = Zeroizing::new(reader.read_mpint()?);
                // builds the signing key only to check x against y
                backend.dsa_signing_key(public.verifying_key(backend)?, x.as_positive_bytes()?)?;
                Ok(Self {
                    public: public.into(),
                    secret: Secret::Dsa { x },
                    comment: String::new(),
                })
            }
        }
    }
}

impl PartialEq for KeyPair {
    /// Pairs are equal when they hold the same key; comments are ignored.
    fn eq(&self, other: &Self) -> bool {
        self.public == other.public
    }
}

impl Eq for KeyPair {}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &self.public.algorithm_name())
            .field("fingerprint", &self.public.fingerprint())
            .field("comment", &self.comment)
            .finish_non_exhaustive()
    }
}

fn to_biguint(value: &Mpint) -> Result<BigUint> {
    Ok(BigUint::from_bytes_be(value.as_positive_bytes()?))
}

fn secret_mpint(value: &BigUint) -> Zeroizing<Mpint> {
    Zeroizing::new(Mpint::from_positive_bytes(&value.to_bytes_be()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn private_round_trip(backend: &CryptoBackend, pair: &KeyPair) -> KeyPair {
        let mut writer = Writer::new();
        pair.encode_private(&mut writer).unwrap();
        let bytes = writer.into_bytes();
        let mut reader = Reader::new(&bytes);
        let decoded = KeyPair::decode_private(backend, &mut reader).unwrap();
        assert!(reader.is_empty());
        decoded
    }

    #[rstest]
    #[case(KeyGenSpec::Ed25519)]
    #[case(KeyGenSpec::Ecdsa(EcdsaCurve::NistP256))]
    #[case(KeyGenSpec::Ecdsa(EcdsaCurve::NistP384))]
    #[case(KeyGenSpec::Ecdsa(EcdsaCurve::NistP521))]
    fn test_generate_sign_verify(#[case] spec: KeyGenSpec) {
        let backend = CryptoBackend::default();
        let pair = KeyPair::generate(&backend, spec).unwrap();
        assert_eq!(pair.algorithm(), spec.algorithm());

        let signature = pair.sign(&backend, b"hello").unwrap();
        let public = pair.public_key();
        assert!(public.verify(&backend, &signature, b"hello").unwrap());
        assert!(!public.verify(&backend, &signature, b"hullo").unwrap());

        assert_eq!(private_round_trip(&backend, &pair), pair);
    }

    #[test]
    fn test_rsa_generate_sign_verify() {
        let backend = CryptoBackend::default();
        let pair = KeyPair::generate(&backend, KeyGenSpec::Rsa { bits: 1024 }).unwrap();
        assert_eq!(pair.public_key().bit_length(), 1024);

        for hash in [RsaHash::Sha1, RsaHash::Sha256, RsaHash::Sha512] {
            let signature = pair.sign_with(&backend, hash, b"hello").unwrap();
            let blob = SignatureBlob::parse(&signature).unwrap();
            assert_eq!(blob.algorithm_name(), Some(hash.signature_name()));
            assert_eq!(blob.raw.len(), 128);
            assert!(pair.public_key().verify(&backend, &signature, b"hello").unwrap());
        }

        assert_eq!(private_round_trip(&backend, &pair), pair);
    }

    #[test]
    fn test_rsa_generation_floor() {
        let backend = CryptoBackend::default();
        let err = KeyPair::generate(&backend, KeyGenSpec::Rsa { bits: 512 }).unwrap_err();
        assert!(matches!(err, Error::PolicyViolation(_)));
    }

    #[test]
    fn test_mismatched_ed25519_halves() {
        let backend = CryptoBackend::default();
        let pair = KeyPair::generate(&backend, KeyGenSpec::Ed25519).unwrap();
        let mut writer = Writer::new();
        pair.encode_private(&mut writer).unwrap();
        let mut bytes = writer.into_bytes();
        // last byte of the embedded public copy
        let last = bytes.len() - 1;
        bytes[last] ^= 1;
        let err = KeyPair::decode_private(&backend, &mut Reader::new(&bytes)).unwrap_err();
        assert!(matches!(err, Error::MalformedKey { .. }));
    }

    #[test]
    fn test_debug_hides_secret() {
        let backend = CryptoBackend::default();
        let pair = KeyPair::generate(&backend, KeyGenSpec::Ed25519)
            .unwrap()
            .with_comment("me@host");
        let rendered = format!("{pair:?}");
        assert!(rendered.contains("me@host"));
        assert!(rendered.contains("SHA256:"));
        assert!(!rendered.contains("seed"));
    }

    #[test]
    fn test_dsa_generation_not_offered() {
        assert!(matches!(
            KeyGenSpec::for_algorithm(KeyAlgorithm::Dsa, 0),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }
}
