use crate::error::{Error, Result};
use crate::handshake::extensions::{self, Extension};
use crate::handshake::{HandshakeMessage, HandshakeType};
use crate::utils;

#[derive(Debug)]
pub struct CertificateEntry {
    pub cert_data: Vec<u8>,
    pub extensions: Vec<Extension>,
}

impl CertificateEntry {
    pub fn new(cert_data: Vec<u8>, extensions: Vec<Extension>) -> Self {
        Self { cert_data, extensions }
    }

    pub fn parse(data: &[u8], pos: &mut usize) -> Result<Self> {
        let cert_data = utils::read_vector_u24(data, pos)?.to_vec();
        if cert_data.is_empty() {
            return Err(Error::ParseError("Empty certificate entry".to_string()));
        }
        let extensions = extensions::parse_extensions(data, pos)?;

        Ok(Self { cert_data, extensions })
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut result = Vec::new();
        utils::write_vector_u24(&mut result, &self.cert_data)?;
        result.extend_from_slice(&extensions::serialize_extensions(&self.extensions)?);
        Ok(result)
    }
}

#[derive(Debug)]
pub struct Certificate {
    pub cert_request_context: Vec<u8>,
    pub certificate_list: Vec<CertificateEntry>,
}

impl Certificate {
    pub fn new(cert_request_context: Vec<u8>, certificate_list: Vec<CertificateEntry>) -> Self {
        Self { cert_request_context, certificate_list }
    }

    /// Wraps a DER chain, leaf first.
    pub fn from_chain(chain: &[Vec<u8>]) -> Self {
        let certificate_list = chain
            .iter()
            .map(|der| CertificateEntry::new(der.clone(), Vec::new()))
            .collect();
        Self::new(Vec::new(), certificate_list)
    }

    pub fn parse(data: &[u8], pos: &mut usize) -> Result<Self> {
        let cert_request_context = utils::read_vector_u8(data, pos)?.to_vec();
        let certs = utils::read_vector_u24(data, pos)?;

        let mut certs_pos = 0;
        let mut certificate_list = Vec::new();
        while certs_pos < certs.len() {
            certificate_list.push(CertificateEntry::parse(certs, &mut certs_pos)?);
        }

        Ok(Self { cert_request_context, certificate_list })
    }

    pub fn leaf(&self) -> Option<&[u8]> {
        self.certificate_list.first().map(|entry| entry.cert_data.as_slice())
    }
}

impl HandshakeMessage for Certificate {
    fn message_type(&self) -> HandshakeType {
        HandshakeType::Certificate
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut result = Vec::new();

        utils::write_vector_u8(&mut result, &self.cert_request_context)?;

        let mut certs_data = Vec::new();
        for cert in &self.certificate_list {
            certs_data.extend_from_slice(&cert.serialize()?);
        }
        utils::write_vector_u24(&mut result, &certs_data)?;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_certificate_parsing() {
        let data = [
            0x00, // Empty request context
            0x00, 0x00, 0x08, // Certificate list length
            0x00, 0x00, 0x03, // Cert data length
            0x30, 0x01, 0x00, // Cert data
            0x00, 0x00, // No extensions
        ];

        let mut pos = 0;
        let certificate = Certificate::parse(&data, &mut pos).unwrap();

        assert!(certificate.cert_request_context.is_empty());
        assert_eq!(certificate.certificate_list.len(), 1);
        assert_eq!(certificate.leaf(), Some(&[0x30, 0x01, 0x00][..]));
        assert_eq!(pos, data.len());
    }

    #[test]
    fn test_certificate_serialization() {
        let certificate = Certificate::from_chain(&[vec![0x30, 0x01, 0x00], vec![0x30, 0x00]]);
        let serialized = certificate.serialize().unwrap();

        let mut pos = 0;
        let parsed = Certificate::parse(&serialized, &mut pos).unwrap();
        assert_eq!(parsed.certificate_list.len(), 2);
        assert_eq!(parsed.certificate_list[1].cert_data, vec![0x30, 0x00]);
    }

    #[test]
    fn test_empty_chain_has_no_leaf() {
        let certificate = Certificate::from_chain(&[]);
        assert!(certificate.leaf().is_none());
    }
}
