use crate::error::Result;
use crate::handshake::extensions::{self, Extension, ExtensionType};
use crate::handshake::{HandshakeMessage, HandshakeType};

#[derive(Debug)]
pub struct EncryptedExtensions {
    pub extensions: Vec<Extension>,
}

impl EncryptedExtensions {
    pub fn new(extensions: Vec<Extension>) -> Self {
        Self { extensions }
    }

    pub fn parse(data: &[u8], pos: &mut usize) -> Result<Self> {
        let extensions = extensions::parse_extensions(data, pos)?;
        Ok(Self { extensions })
    }

    pub fn get_extension(&self, extension_type: ExtensionType) -> Option<&Extension> {
        extensions::find_extension(&self.extensions, extension_type)
    }
}

impl HandshakeMessage for EncryptedExtensions {
    fn message_type(&self) -> HandshakeType {
        HandshakeType::EncryptedExtensions
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        extensions::serialize_extensions(&self.extensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypted_extensions() {
        let message = EncryptedExtensions::new(vec![Extension::new(
            ExtensionType::ApplicationLayerProtocolNegotiation,
            vec![0x00, 0x03, 0x02, b'h', b'3'],
        )]);

        let serialized = message.serialize().unwrap();
        assert_eq!(&serialized[..2], &[0x00, 0x09]);

        let mut pos = 0;
        let parsed = EncryptedExtensions::parse(&serialized, &mut pos).unwrap();
        assert!(parsed
            .get_extension(ExtensionType::ApplicationLayerProtocolNegotiation)
            .is_some());
        assert_eq!(pos, serialized.len());
    }

    #[test]
    fn test_truncated() {
        let mut pos = 0;
        assert!(EncryptedExtensions::parse(&[0x00, 0x05, 0x00], &mut pos).is_err());
    }
}
