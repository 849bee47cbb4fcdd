//! Crypto backend handle
//!
//! All primitive calls go through a [`CryptoBackend`] value created once at
//! startup and passed by reference into decode, verify and sign calls. It
//! carries the random source and the verification policy; there is no
//! process-wide provider state.

use dsa::BigUint;
use rand_core::OsRng;
use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};
use ring::signature::{
    self as ring_sig, Ed25519KeyPair, KeyPair as _, RsaPublicKeyComponents, UnparsedPublicKey,
};
use rsa::traits::PublicKeyParts;
use rsa::Pkcs1v15Sign;
use serde::{Deserialize, Serialize};
use signature::hazmat::{PrehashSigner, PrehashVerifier};
use signature::{Signer, Verifier};
use tracing::debug;
use zeroize::Zeroizing;

use super::algorithm::{EcdsaCurve, KeyAlgorithm, RsaHash, SecurityLevel};
use super::dsa::SIGNATURE_HALF;
use super::signature::ecdsa_raw_from_scalars;
use crate::encoding::Mpint;
use crate::{Error, Result};

/// `DigestInfo` prefix for SHA-1 (RFC 8017, section 9.2)
const SHA1_DIGEST_INFO: [u8; 15] = [
    0x30, 0x21, 0x30, 0x09, 0x06, 0x05, 0x2b, 0x0e, 0x03, 0x02, 0x1a, 0x05, 0x00, 0x04, 0x14,
];

/// Run `$body` with `$ec` bound to the RustCrypto crate of `$curve`
macro_rules! with_curve {
    ($curve:expr, $ec:ident => $body:block) => {
        match $curve {
            EcdsaCurve::NistP256 => {
                use p256 as $ec;
                $body
            }
            EcdsaCurve::NistP384 => {
                use p384 as $ec;
                $body
            }
            EcdsaCurve::NistP521 => {
                use p521 as $ec;
                $body
            }
        }
    };
}

/// Which keys and signature schemes a backend will accept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendPolicy {
    /// Accept `ssh-rsa` (SHA-1) and `ssh-dss` signatures
    #[serde(default = "default_allow_sha1")]
    pub allow_sha1_signatures: bool,

    /// Smallest RSA modulus accepted for verification
    #[serde(default = "default_min_rsa_bits")]
    pub min_rsa_bits: usize,

    /// Keys rated below this level are refused
    #[serde(default = "default_min_security_level")]
    pub min_security_level: SecurityLevel,
}

fn default_allow_sha1() -> bool {
    true
}

fn default_min_rsa_bits() -> usize {
    1024
}

fn default_min_security_level() -> SecurityLevel {
    SecurityLevel::Weak
}

impl Default for BackendPolicy {
    fn default() -> Self {
        Self {
            allow_sha1_signatures: default_allow_sha1(),
            min_rsa_bits: default_min_rsa_bits(),
            min_security_level: default_min_security_level(),
        }
    }
}

/// Random source, primitive dispatch and policy
#[derive(Debug, Clone)]
pub struct CryptoBackend {
    rng: SystemRandom,
    policy: BackendPolicy,
}

impl Default for CryptoBackend {
    fn default() -> Self {
        Self::new(BackendPolicy::default())
    }
}

impl CryptoBackend {
    pub fn new(policy: BackendPolicy) -> Self {
        Self {
            rng: SystemRandom::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &BackendPolicy {
        &self.policy
    }

    /// Whether the policy admits keys of this algorithm at all. RSA is
    /// always admitted here and judged by modulus size per key.
    pub fn permits(&self, algorithm: KeyAlgorithm) -> bool {
        algorithm.security_level() >= self.policy.min_security_level
            || matches!(algorithm, KeyAlgorithm::Rsa)
    }

    /// Fill `out` from the system random source
    pub fn fill_random(&self, out: &mut [u8]) -> Result<()> {
        self.rng
            .fill(out)
            .map_err(|_| Error::Crypto("system random source failed".into()))
    }

    pub fn random_u32(&self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.fill_random(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    /// Refuse keys the policy rates too weak
    pub(crate) fn check_key(
        &self,
        algorithm: KeyAlgorithm,
        bits: usize,
        level: SecurityLevel,
    ) -> Result<()> {
        if algorithm == KeyAlgorithm::Rsa && bits < self.policy.min_rsa_bits {
            return Err(Error::PolicyViolation(format!(
                "RSA key of {} bits is below the minimum of {}",
                bits, self.policy.min_rsa_bits
            )));
        }
        if level < self.policy.min_security_level {
            return Err(Error::PolicyViolation(format!(
                "{} key rated {} is below the minimum of {}",
                algorithm, level, self.policy.min_security_level
            )));
        }
        Ok(())
    }

    fn check_sha1(&self, scheme: &str) -> Result<()> {
        if self.policy.allow_sha1_signatures {
            Ok(())
        } else {
            Err(Error::PolicyViolation(format!(
                "{scheme} signatures use SHA-1, which is disabled"
            )))
        }
    }

    pub(crate) fn verify_ed25519(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
        UnparsedPublicKey::new(&ring_sig::ED25519, public_key)
            .verify(message, signature)
            .is_ok()
    }

    /// PKCS#1 v1.5 verification; `modulus` and `exponent` are unsigned
    /// magnitudes without leading zeros.
    pub(crate) fn verify_rsa(
        &self,
        modulus: &[u8],
        exponent: &[u8],
        hash: RsaHash,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool> {
        if hash == RsaHash::Sha1 {
            self.check_sha1("ssh-rsa")?;
        }
        if signature.len() > modulus.len() {
            return Err(Error::MalformedSignature(format!(
                "RSA signature of {} bytes exceeds the {}-byte modulus",
                signature.len(),
                modulus.len()
            )));
        }

        // ring's 2048-bit parameter sets count bits, not bytes
        let modulus_bits = match modulus.first() {
            Some(&top) => modulus.len() * 8 - top.leading_zeros() as usize,
            None => 0,
        };
        let legacy_size = modulus_bits < 2048;
        let params: &ring_sig::RsaParameters = match (hash, legacy_size) {
            (RsaHash::Sha1, true) => &ring_sig::RSA_PKCS1_1024_8192_SHA1_FOR_LEGACY_USE_ONLY,
            (RsaHash::Sha1, false) => &ring_sig::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
            (RsaHash::Sha256, true) => &ring_sig::RSA_PKCS1_1024_8192_SHA256_FOR_LEGACY_USE_ONLY,
            (RsaHash::Sha256, false) => &ring_sig::RSA_PKCS1_2048_8192_SHA256,
            (RsaHash::Sha512, true) => &ring_sig::RSA_PKCS1_1024_8192_SHA512_FOR_LEGACY_USE_ONLY,
            (RsaHash::Sha512, false) => &ring_sig::RSA_PKCS1_2048_8192_SHA512,
        };

        // Some signers strip leading zero bytes from the signature integer
        let mut padded = vec![0u8; modulus.len() - signature.len()];
        padded.extend_from_slice(signature);

        let key = RsaPublicKeyComponents {
            n: modulus,
            e: exponent,
        };
        Ok(key.verify(params, message, &padded).is_ok())
    }

    /// Check that `point` is an uncompressed SEC1 point on `curve`
    pub(crate) fn validate_ec_point(&self, curve: EcdsaCurve, point: &[u8]) -> Result<()> {
        if point.len() != curve.point_size() || point.first() != Some(&0x04) {
            return Err(Error::malformed(format!(
                "expected an uncompressed {} point of {} bytes",
                curve,
                curve.point_size()
            )));
        }
        let on_curve = match curve {
            EcdsaCurve::NistP256 => p256::PublicKey::from_sec1_bytes(point).is_ok(),
            EcdsaCurve::NistP384 => p384::PublicKey::from_sec1_bytes(point).is_ok(),
            EcdsaCurve::NistP521 => p521::PublicKey::from_sec1_bytes(point).is_ok(),
        };
        if on_curve {
            Ok(())
        } else {
            Err(Error::malformed(format!("point is not on curve {curve}")))
        }
    }

    /// Verify a DER-encoded ECDSA signature with the curve's SSH digest
    pub(crate) fn verify_ecdsa(
        &self,
        curve: EcdsaCurve,
        point: &[u8],
        der_signature: &[u8],
        message: &[u8],
    ) -> bool {
        match curve {
            EcdsaCurve::NistP256 => UnparsedPublicKey::new(&ring_sig::ECDSA_P256_SHA256_ASN1, point)
                .verify(message, der_signature)
                .is_ok(),
            EcdsaCurve::NistP384 => UnparsedPublicKey::new(&ring_sig::ECDSA_P384_SHA384_ASN1, point)
                .verify(message, der_signature)
                .is_ok(),
            EcdsaCurve::NistP521 => {
                let Ok(key) = p521::ecdsa::VerifyingKey::from_sec1_bytes(point) else {
                    return false;
                };
                let Ok(signature) = p521::ecdsa::Signature::from_der(der_signature) else {
                    debug!("P-521 signature rejected by DER decoder");
                    return false;
                };
                key.verify(message, &signature).is_ok()
            }
        }
    }

    /// Build a DSA verifying key, rejecting invalid domain parameters
    pub(crate) fn dsa_verifying_key(
        &self,
        p: &[u8],
        q: &[u8],
        g: &[u8],
        y: &[u8],
    ) -> Result<dsa::VerifyingKey> {
        let components = dsa::Components::from_components(
            BigUint::from_bytes_be(p),
            BigUint::from_bytes_be(q),
            BigUint::from_bytes_be(g),
        )
        .map_err(|_| Error::malformed("invalid DSA domain parameters"))?;
        dsa::VerifyingKey::from_components(components, BigUint::from_bytes_be(y))
            .map_err(|_| Error::malformed("invalid DSA public value"))
    }

    /// Verify `r`, `s` over the SHA-1 digest of `message`
    pub(crate) fn verify_dsa(
        &self,
        key: &dsa::VerifyingKey,
        r: &[u8],
        s: &[u8],
        message: &[u8],
    ) -> Result<bool> {
        self.check_sha1("ssh-dss")?;
        let Ok(signature) =
            dsa::Signature::from_components(BigUint::from_bytes_be(r), BigUint::from_bytes_be(s))
        else {
            return Ok(false);
        };
        let digest = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, message);
        Ok(key.verify_prehash(digest.as_ref(), &signature).is_ok())
    }

    /// Public half of an Ed25519 seed
    pub(crate) fn ed25519_public_from_seed(&self, seed: &[u8]) -> Result<[u8; 32]> {
        let pair = Ed25519KeyPair::from_seed_unchecked(seed)
            .map_err(|e| Error::malformed(format!("invalid Ed25519 seed: {e}")))?;
        let mut public = [0u8; 32];
        public.copy_from_slice(pair.public_key().as_ref());
        Ok(public)
    }

    pub(crate) fn sign_ed25519(&self, seed: &[u8], public: &[u8], message: &[u8]) -> Result<Vec<u8>> {
        let pair = Ed25519KeyPair::from_seed_and_public_key(seed, public)
            .map_err(|_| Error::malformed("Ed25519 seed does not match its public key"))?;
        Ok(pair.sign(message).as_ref().to_vec())
    }

    /// Fresh scalar (fixed width) and uncompressed public point
    pub(crate) fn generate_ecdsa(&self, curve: EcdsaCurve) -> (Zeroizing<Vec<u8>>, Vec<u8>) {
        with_curve!(curve, ec => {
            let secret = ec::ecdsa::SigningKey::random(&mut OsRng);
            let point = ec::ecdsa::VerifyingKey::from(&secret).to_encoded_point(false);
            (Zeroizing::new(secret.to_bytes().to_vec()), point.as_bytes().to_vec())
        })
    }

    /// Uncompressed public point for a fixed-width private scalar
    pub(crate) fn ecdsa_public_from_scalar(&self, curve: EcdsaCurve, scalar: &[u8]) -> Result<Vec<u8>> {
        with_curve!(curve, ec => {
            let secret = ec::ecdsa::SigningKey::from_slice(scalar)
                .map_err(|_| Error::malformed(format!("invalid {curve} private scalar")))?;
            let point = ec::ecdsa::VerifyingKey::from(&secret).to_encoded_point(false);
            Ok(point.as_bytes().to_vec())
        })
    }

    /// Sign with the curve's SSH digest, returning the raw `mpint r, mpint s`
    pub(crate) fn sign_ecdsa(&self, curve: EcdsaCurve, scalar: &[u8], message: &[u8]) -> Result<Vec<u8>> {
        with_curve!(curve, ec => {
            let secret = ec::ecdsa::SigningKey::from_slice(scalar)
                .map_err(|_| Error::malformed(format!("invalid {curve} private scalar")))?;
            let signature: ec::ecdsa::Signature = secret.sign(message);
            let (r, s) = signature.split_bytes();
            Ok(ecdsa_raw_from_scalars(&r, &s))
        })
    }

    pub(crate) fn generate_rsa(&self, bits: usize) -> Result<rsa::RsaPrivateKey> {
        rsa::RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| Error::Crypto(format!("RSA key generation failed: {e}")))
    }

    /// PKCS#1 v1.5 signature, exactly as long as the modulus
    pub(crate) fn sign_rsa(
        &self,
        key: &rsa::RsaPrivateKey,
        hash: RsaHash,
        message: &[u8],
    ) -> Result<Vec<u8>> {
        let (scheme, digest) = match hash {
            RsaHash::Sha1 => {
                self.check_sha1("ssh-rsa")?;
                let scheme = Pkcs1v15Sign {
                    hash_len: Some(20),
                    prefix: SHA1_DIGEST_INFO.into(),
                };
                (scheme, digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, message))
            }
            RsaHash::Sha256 => (
                Pkcs1v15Sign::new::<sha2::Sha256>(),
                digest::digest(&digest::SHA256, message),
            ),
            RsaHash::Sha512 => (
                Pkcs1v15Sign::new::<sha2::Sha512>(),
                digest::digest(&digest::SHA512, message),
            ),
        };
        let signature = key
            .sign_with_rng(&mut OsRng, scheme, digest.as_ref())
            .map_err(|e| Error::Crypto(format!("RSA signing failed: {e}")))?;
        debug_assert_eq!(signature.len(), key.size());
        Ok(signature)
    }

    /// Rebuild a DSA signing key, checking that `y = g^x mod p`
    pub(crate) fn dsa_signing_key(
        &self,
        verifying_key: dsa::VerifyingKey,
        x: &[u8],
    ) -> Result<dsa::SigningKey> {
        let x = BigUint::from_bytes_be(x);
        let components = verifying_key.components();
        if components.g().modpow(&x, components.p()) != *verifying_key.y() {
            return Err(Error::malformed("DSA private value does not match public value"));
        }
        dsa::SigningKey::from_components(verifying_key, x)
            .map_err(|_| Error::malformed("invalid DSA private value"))
    }

    /// 40-byte `r || s` over the SHA-1 digest of `message`
    pub(crate) fn sign_dsa(&self, key: &dsa::SigningKey, message: &[u8]) -> Result<Vec<u8>> {
        self.check_sha1("ssh-dss")?;
        let digest = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, message);
        let signature: dsa::Signature = key
            .sign_prehash(digest.as_ref())
            .map_err(|e| Error::Crypto(format!("DSA signing failed: {e}")))?;

        let mut raw = Mpint::from_positive_bytes(&signature.r().to_bytes_be())
            .to_fixed_width(SIGNATURE_HALF)?;
        raw.extend(
            Mpint::from_positive_bytes(&signature.s().to_bytes_be()).to_fixed_width(SIGNATURE_HALF)?,
        );
        Ok(raw)
    }
}
