use crate::crypto::hkdf::HashAlgorithm;
use crate::error::{Error, Result};
use crate::handshake::{HandshakeMessage, HandshakeType};
use ring::digest::Context;
use std::convert::TryFrom;
use std::fmt;

/// Running hash over every handshake message exchanged so far.
///
/// The negotiated hash is only known once ServerHello is seen, so the raw
/// messages are kept and replayed if the algorithm changes.
pub struct TranscriptHash {
    context: Context,
    algorithm: HashAlgorithm,
    messages: Vec<Vec<u8>>,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Sha256 => write!(f, "SHA-256"),
            HashAlgorithm::Sha384 => write!(f, "SHA-384"),
        }
    }
}

impl TranscriptHash {
    pub fn new() -> Self {
        Self::with_algorithm(HashAlgorithm::Sha256)
    }

    pub fn with_algorithm(algorithm: HashAlgorithm) -> Self {
        Self {
            context: Context::new(algorithm.digest_algorithm()),
            algorithm,
            messages: Vec::new(),
        }
    }

    pub fn update(&mut self, message: &dyn HandshakeMessage) -> Result<()> {
        let encoded = message.to_bytes()?;
        self.add_raw(&encoded)
    }

    /// Adds an already framed message (type, u24 length, body).
    pub fn add_raw(&mut self, encoded: &[u8]) -> Result<()> {
        if encoded.len() < 4 {
            return Err(Error::ParseError("Handshake message too short for transcript".to_string()));
        }
        self.context.update(encoded);
        self.messages.push(encoded.to_vec());
        Ok(())
    }

    /// Switches hash algorithm, replaying every stored message.
    pub fn set_algorithm(&mut self, algorithm: HashAlgorithm) {
        if algorithm == self.algorithm {
            return;
        }

        log::trace!("Transcript switching from {} to {}", self.algorithm, algorithm);

        self.algorithm = algorithm;
        self.context = Context::new(algorithm.digest_algorithm());
        for message in &self.messages {
            self.context.update(message);
        }
    }

    pub fn current_hash(&self) -> Vec<u8> {
        let digest = self.context.clone().finish();
        digest.as_ref().to_vec()
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn message_types(&self) -> Vec<HandshakeType> {
        self.messages
            .iter()
            .filter_map(|m| HandshakeType::try_from(m[0]).ok())
            .collect()
    }
}

impl Default for TranscriptHash {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake::Finished;
    use ring::digest;

    #[test]
    fn test_transcript_hash_sha256() {
        let mut transcript = TranscriptHash::new();
        assert_eq!(transcript.algorithm(), HashAlgorithm::Sha256);

        let finished = Finished::new(vec![0xAA; 4]);
        transcript.update(&finished).unwrap();

        let expected = digest::digest(&digest::SHA256, &[0x14, 0x00, 0x00, 0x04, 0xAA, 0xAA, 0xAA, 0xAA]);
        assert_eq!(transcript.current_hash(), expected.as_ref());
        assert_eq!(transcript.message_types(), vec![HandshakeType::Finished]);
    }

    #[test]
    fn test_transcript_hash_sha384_switch() {
        let mut switched = TranscriptHash::new();
        let mut direct = TranscriptHash::with_algorithm(HashAlgorithm::Sha384);

        for body in [vec![1u8, 2, 3], vec![4u8, 5]] {
            let finished = Finished::new(body);
            switched.update(&finished).unwrap();
            direct.update(&finished).unwrap();
        }

        switched.set_algorithm(HashAlgorithm::Sha384);
        assert_eq!(switched.algorithm(), HashAlgorithm::Sha384);
        assert_eq!(switched.current_hash().len(), 48);
        assert_eq!(switched.current_hash(), direct.current_hash());
    }

    #[test]
    fn test_short_raw_message_rejected() {
        let mut transcript = TranscriptHash::new();
        assert!(transcript.add_raw(&[0x14, 0x00]).is_err());
    }
}
