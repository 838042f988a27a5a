pub mod aead;
pub mod hkdf;
pub mod key_exchange;
pub mod signature;
pub mod transcript;

pub use aead::{AeadAlgorithm, AeadKey, PacketKey};
pub use hkdf::{HashAlgorithm, TrafficSecrets};
pub use key_exchange::KeyPair;
pub use signature::{SignatureScheme, SigningKey};
pub use transcript::TranscriptHash;

use crate::error::{Error, Result};
use ring::rand::{SecureRandom, SystemRandom};

pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; len];
    SystemRandom::new()
        .fill(&mut out)
        .map_err(|_| Error::CryptoError("System random source failed".to_string()))?;
    Ok(out)
}

pub fn random_array<const N: usize>() -> Result<[u8; N]> {
    let mut out = [0u8; N];
    SystemRandom::new()
        .fill(&mut out)
        .map_err(|_| Error::CryptoError("System random source failed".to_string()))?;
    Ok(out)
}
