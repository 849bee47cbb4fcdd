//! Public key algorithms, signatures and key pairs

mod algorithm;
mod backend;
mod dsa;
mod ecdsa;
mod ed25519;
mod fingerprint;
mod pair;
mod public;
mod rsa;
pub(crate) mod signature;

pub use self::algorithm::{EcdsaCurve, KeyAlgorithm, RsaHash, SecurityLevel};
pub use self::backend::{BackendPolicy, CryptoBackend};
pub use self::dsa::DsaPublicKey;
pub use self::ecdsa::EcdsaPublicKey;
pub use self::ed25519::Ed25519PublicKey;
pub use self::fingerprint::{fingerprint, HashAlg};
pub use self::pair::{KeyGenSpec, KeyPair, DEFAULT_RSA_BITS, MIN_RSA_BITS};
pub use self::public::{PublicKey, SshPublicKey};
pub use self::rsa::RsaPublicKey;
pub use self::signature::SignatureBlob;
