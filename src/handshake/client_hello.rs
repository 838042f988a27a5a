use crate::error::{Error, Result};
use crate::handshake::extensions::{self, Extension, ExtensionType};
use crate::handshake::{CipherSuite, HandshakeMessage, HandshakeType};
use crate::utils;
use std::convert::TryFrom;

#[derive(Debug, Clone)]
pub struct ClientHello {
    pub legacy_version: u16,
    pub random: [u8; 32],
    pub legacy_session_id: Vec<u8>,
    pub cipher_suites: Vec<CipherSuite>,
    pub legacy_compression_methods: Vec<u8>,
    pub extensions: Vec<Extension>,
}

impl ClientHello {
    pub fn new(
        legacy_version: u16,
        random: [u8; 32],
        legacy_session_id: Vec<u8>,
        cipher_suites: Vec<CipherSuite>,
        legacy_compression_methods: Vec<u8>,
        extensions: Vec<Extension>,
    ) -> Self {
        Self {
            legacy_version,
            random,
            legacy_session_id,
            cipher_suites,
            legacy_compression_methods,
            extensions,
        }
    }

    pub fn parse(data: &[u8], pos: &mut usize) -> Result<Self> {
        let legacy_version = utils::read_u16(data, pos)?;

        let mut random = [0u8; 32];
        random.copy_from_slice(utils::read_bytes(data, pos, 32)?);

        let session_id = utils::read_vector_u8(data, pos)?.to_vec();

        let cipher_suites_bytes = utils::read_vector_u16(data, pos)?;
        if cipher_suites_bytes.len() % 2 != 0 {
            return Err(Error::ParseError("Cipher suites length must be even".to_string()));
        }

        // Suites we cannot use are dropped rather than rejected
        let cipher_suites = cipher_suites_bytes
            .chunks_exact(2)
            .filter_map(|pair| CipherSuite::try_from(u16::from_be_bytes([pair[0], pair[1]])).ok())
            .collect();

        let compression_methods = utils::read_vector_u8(data, pos)?.to_vec();
        let extensions = extensions::parse_extensions(data, pos)?;

        Ok(Self {
            legacy_version,
            random,
            legacy_session_id: session_id,
            cipher_suites,
            legacy_compression_methods: compression_methods,
            extensions,
        })
    }

    pub fn get_extension(&self, extension_type: ExtensionType) -> Option<&Extension> {
        extensions::find_extension(&self.extensions, extension_type)
    }
}

impl HandshakeMessage for ClientHello {
    fn message_type(&self) -> HandshakeType {
        HandshakeType::ClientHello
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut result = Vec::new();

        utils::write_u16(&mut result, self.legacy_version);
        result.extend_from_slice(&self.random);
        utils::write_vector_u8(&mut result, &self.legacy_session_id)?;

        let mut cipher_suites = Vec::with_capacity(self.cipher_suites.len() * 2);
        for suite in &self.cipher_suites {
            utils::write_u16(&mut cipher_suites, *suite as u16);
        }
        utils::write_vector_u16(&mut result, &cipher_suites)?;

        utils::write_vector_u8(&mut result, &self.legacy_compression_methods)?;
        result.extend_from_slice(&extensions::serialize_extensions(&self.extensions)?);

        Ok(result)
    }
}
