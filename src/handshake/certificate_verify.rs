use crate::crypto::signature::{self, SignatureScheme, SigningKey};
use crate::error::Result;
use crate::handshake::{HandshakeMessage, HandshakeType};
use crate::utils;
use std::convert::TryFrom;

#[derive(Debug)]
pub struct CertificateVerify {
    pub algorithm: SignatureScheme,
    pub signature: Vec<u8>,
}

impl CertificateVerify {
    pub fn new(algorithm: SignatureScheme, signature: Vec<u8>) -> Self {
        Self { algorithm, signature }
    }

    /// Signs the server side CertificateVerify content for `transcript_hash`.
    pub fn sign(key: &SigningKey, transcript_hash: &[u8]) -> Result<Self> {
        let message = signature::certificate_verify_message(transcript_hash, true);
        Ok(Self::new(key.scheme(), key.sign(&message)?))
    }

    pub fn parse(data: &[u8], pos: &mut usize) -> Result<Self> {
        let algorithm = SignatureScheme::try_from(utils::read_u16(data, pos)?)?;
        let signature = utils::read_vector_u16(data, pos)?.to_vec();

        Ok(Self { algorithm, signature })
    }

    pub fn verify(&self, transcript_hash: &[u8], public_key: &[u8]) -> Result<()> {
        signature::verify_certificate_verify(
            self.algorithm,
            public_key,
            &self.signature,
            transcript_hash,
            true,
        )
    }
}

impl HandshakeMessage for CertificateVerify {
    fn message_type(&self) -> HandshakeType {
        HandshakeType::CertificateVerify
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut result = Vec::new();
        utils::write_u16(&mut result, self.algorithm as u16);
        utils::write_vector_u16(&mut result, &self.signature)?;
        Ok(result)
    }
}
