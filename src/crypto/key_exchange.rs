// Ephemeral key exchange
use crate::error::{Error, Result};
use crate::handshake::NamedGroup;
use ring::{agreement, rand};
use zeroize::Zeroizing;

/// An ephemeral key pair. The private half is consumed by the first agreement.
pub struct KeyPair {
    pub group: NamedGroup,
    private_key: Option<agreement::EphemeralPrivateKey>,
    pub public_key: Vec<u8>,
}

impl KeyPair {
    pub fn generate(group: NamedGroup) -> Result<Self> {
        match group {
            NamedGroup::X25519 => Self::generate_x25519(),
            _ => Err(Error::CryptoError(format!(
                "Key exchange group {:?} not supported",
                group
            ))),
        }
    }

    fn generate_x25519() -> Result<Self> {
        let rng = rand::SystemRandom::new();

        let private_key = agreement::EphemeralPrivateKey::generate(&agreement::X25519, &rng)
            .map_err(|_| Error::CryptoError("Failed to generate X25519 private key".to_string()))?;

        let public_key = private_key
            .compute_public_key()
            .map_err(|_| Error::CryptoError("Failed to compute X25519 public key".to_string()))?
            .as_ref()
            .to_vec();

        Ok(Self {
            group: NamedGroup::X25519,
            private_key: Some(private_key),
            public_key,
        })
    }

    /// Computes the shared secret with the peer's public key.
    pub fn agree(&mut self, peer_public: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let private_key = self
            .private_key
            .take()
            .ok_or_else(|| Error::InvalidState("Key pair already used".to_string()))?;

        let peer = agreement::UnparsedPublicKey::new(&agreement::X25519, peer_public);
        agreement::agree_ephemeral(private_key, &peer, |shared| Zeroizing::new(shared.to_vec()))
            .map_err(|_| Error::CryptoError("X25519 key agreement failed".to_string()))
    }
}
