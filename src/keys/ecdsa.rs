//! `ecdsa-sha2-*` public keys

use super::algorithm::{EcdsaCurve, KeyAlgorithm};
use super::backend::CryptoBackend;
use super::public::SshPublicKey;
use super::signature::{ecdsa_raw_to_der, SignatureBlob};
use crate::encoding::{Reader, Writer};
use crate::{Error, Result};

/// ECDSA public key: a named curve and an uncompressed point on it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EcdsaPublicKey {
    curve: EcdsaCurve,
    point: Vec<u8>,
}

impl EcdsaPublicKey {
    /// Build a key, checking that `point` lies on `curve`.
    pub fn new(backend: &CryptoBackend, curve: EcdsaCurve, point: Vec<u8>) -> Result<Self> {
        backend.validate_ec_point(curve, &point)?;
        Ok(Self { curve, point })
    }

    /// Build a key from a curve name; unknown names fail right here.
    pub fn from_curve_name(backend: &CryptoBackend, curve: &str, point: Vec<u8>) -> Result<Self> {
        Self::new(backend, EcdsaCurve::from_name(curve)?, point)
    }

    pub fn curve(&self) -> EcdsaCurve {
        self.curve
    }

    /// SEC1 uncompressed point bytes
    pub fn point(&self) -> &[u8] {
        &self.point
    }

    /// `string curve-identifier, string Q`
    ///
    /// The curve comes from the algorithm name; the identifier in the blob
    /// has to agree with it.
    pub(crate) fn decode_fields(
        backend: &CryptoBackend,
        reader: &mut Reader<'_>,
        curve: EcdsaCurve,
    ) -> Result<Self> {
        let identifier = reader.read_string()?;
        let embedded = EcdsaCurve::from_name(identifier)?;
        if embedded != curve {
            return Err(Error::malformed(format!(
                "key names curve {curve} but embeds {identifier}"
            )));
        }
        let point = reader.read_binary_string()?;
        Self::new(backend, curve, point.to_vec())
    }
}

impl SshPublicKey for EcdsaPublicKey {
    fn algorithm(&self) -> KeyAlgorithm {
        KeyAlgorithm::Ecdsa(self.curve)
    }

    fn encode_fields(&self, writer: &mut Writer) {
        writer
            .write_string(self.curve.identifier())
            .write_binary_string(&self.point);
    }

    fn bit_length(&self) -> usize {
        self.curve.bit_length()
    }

    fn verify_blob(
        &self,
        backend: &CryptoBackend,
        signature: &SignatureBlob<'_>,
        message: &[u8],
    ) -> Result<bool> {
        let algorithm = self.algorithm();
        backend.check_key(algorithm, self.bit_length(), self.security_level())?;
        signature.check_algorithm(&[algorithm.name()])?;

        let der = ecdsa_raw_to_der(signature.raw)?;
        Ok(backend.verify_ecdsa(self.curve, &self.point, &der, message))
    }
}
