use crate::error::Result;
use crate::handshake::extensions::{self, Extension, ExtensionType};
use crate::handshake::{CipherSuite, HandshakeMessage, HandshakeType};
use crate::utils;
use std::convert::TryFrom;

const HELLO_RETRY_REQUEST_RANDOM: [u8; 32] = [
    0xCF, 0x21, 0xAD, 0x74, 0xE5, 0x9A, 0x61, 0x11,
    0xBE, 0x1D, 0x8C, 0x02, 0x1E, 0x65, 0xB8, 0x91,
    0xC2, 0xA2, 0x11, 0x16, 0x7A, 0xBB, 0x8C, 0x5E,
    0x07, 0x9E, 0x09, 0xE2, 0xC8, 0xA8, 0x33, 0x9C,
];

#[derive(Debug, Clone)]
pub struct ServerHello {
    pub legacy_version: u16,
    pub random: [u8; 32],
    pub legacy_session_id_echo: Vec<u8>,
    pub cipher_suite: CipherSuite,
    pub legacy_compression_method: u8,
    pub extensions: Vec<Extension>,
}

impl ServerHello {
    pub fn new(
        legacy_version: u16,
        random: [u8; 32],
        legacy_session_id_echo: Vec<u8>,
        cipher_suite: CipherSuite,
        legacy_compression_method: u8,
        extensions: Vec<Extension>,
    ) -> Self {
        Self {
            legacy_version,
            random,
            legacy_session_id_echo,
            cipher_suite,
            legacy_compression_method,
            extensions,
        }
    }

    pub fn parse(data: &[u8], pos: &mut usize) -> Result<Self> {
        let legacy_version = utils::read_u16(data, pos)?;

        let mut random = [0u8; 32];
        random.copy_from_slice(utils::read_bytes(data, pos, 32)?);

        let session_id = utils::read_vector_u8(data, pos)?.to_vec();
        let cipher_suite = CipherSuite::try_from(utils::read_u16(data, pos)?)?;
        let compression_method = utils::read_u8(data, pos)?;
        let extensions = extensions::parse_extensions(data, pos)?;

        Ok(Self {
            legacy_version,
            random,
            legacy_session_id_echo: session_id,
            cipher_suite,
            legacy_compression_method: compression_method,
            extensions,
        })
    }

    pub fn is_hello_retry_request(&self) -> bool {
        self.random == HELLO_RETRY_REQUEST_RANDOM
    }

    pub fn get_extension(&self, extension_type: ExtensionType) -> Option<&Extension> {
        extensions::find_extension(&self.extensions, extension_type)
    }
}

impl HandshakeMessage for ServerHello {
    fn message_type(&self) -> HandshakeType {
        HandshakeType::ServerHello
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut result = Vec::new();

        utils::write_u16(&mut result, self.legacy_version);
        result.extend_from_slice(&self.random);
        utils::write_vector_u8(&mut result, &self.legacy_session_id_echo)?;
        utils::write_u16(&mut result, self.cipher_suite as u16);
        utils::write_u8(&mut result, self.legacy_compression_method);
        result.extend_from_slice(&extensions::serialize_extensions(&self.extensions)?);

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_hello_parsing() {
        // A minimal ServerHello message
        let server_hello_data = [
            0x03, 0x03, // TLS 1.2 legacy version
            // Random 32 bytes
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08,
            0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10,
            0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18,
            0x19, 0x1A, 0x1B, 0x1C, 0x1D, 0x1E, 0x1F, 0x20,
            0x00, // Empty session ID echo
            0x13, 0x01, // TLS_AES_128_GCM_SHA256 cipher suite
            0x00, // Null compression
            0x00, 0x06, // Extensions length: 6 bytes
            0x00, 0x2B, // Supported versions extension
            0x00, 0x02, // Length 2
            0x03, 0x04, // TLS 1.3
        ];

        let mut pos = 0;
        let server_hello = ServerHello::parse(&server_hello_data, &mut pos).unwrap();

        assert_eq!(server_hello.legacy_version, 0x0303);
        assert_eq!(server_hello.random[0], 0x01);
        assert_eq!(server_hello.random[31], 0x20);
        assert!(server_hello.legacy_session_id_echo.is_empty());
        assert_eq!(server_hello.cipher_suite, CipherSuite::TlsAes128GcmSha256);
        assert_eq!(server_hello.legacy_compression_method, 0x00);
        assert_eq!(
            server_hello.get_extension(ExtensionType::SupportedVersions).unwrap().data,
            [0x03, 0x04]
        );
        assert!(!server_hello.is_hello_retry_request());
    }

    #[test]
    fn test_unknown_cipher_suite_rejected() {
        let mut data = vec![0x03, 0x03];
        data.extend_from_slice(&[0u8; 32]);
        data.extend_from_slice(&[0x00, 0x13, 0x05, 0x00, 0x00, 0x00]);

        let mut pos = 0;
        assert!(ServerHello::parse(&data, &mut pos).is_err());
    }

    #[test]
    fn test_hello_retry_request() {
        let hello_retry = ServerHello::new(
            0x0303,
            HELLO_RETRY_REQUEST_RANDOM,
            vec![],
            CipherSuite::TlsAes128GcmSha256,
            0x00,
            vec![],
        );

        assert!(hello_retry.is_hello_retry_request());
    }
}
