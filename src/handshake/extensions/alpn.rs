// Application-Layer Protocol Negotiation (RFC 7301)
use crate::error::{Error, Result};
use crate::handshake::extensions::{Extension, ExtensionType};
use crate::utils;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolNameList {
    pub protocols: Vec<Vec<u8>>,
}

impl ProtocolNameList {
    pub fn new(protocols: Vec<Vec<u8>>) -> Self {
        Self { protocols }
    }

    pub fn create_extension(&self) -> Result<Extension> {
        let mut list = Vec::new();
        for protocol in &self.protocols {
            if protocol.is_empty() {
                return Err(Error::ProtocolError("Empty ALPN protocol name".to_string()));
            }
            utils::write_vector_u8(&mut list, protocol)?;
        }

        let mut data = Vec::with_capacity(2 + list.len());
        utils::write_vector_u16(&mut data, &list)?;
        Ok(Extension::new(ExtensionType::ApplicationLayerProtocolNegotiation, data))
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut pos = 0;
        let list = utils::read_vector_u16(data, &mut pos)?;
        if pos != data.len() {
            return Err(Error::ParseError("Trailing bytes in ALPN extension".to_string()));
        }

        let mut protocols = Vec::new();
        let mut list_pos = 0;
        while list_pos < list.len() {
            let name = utils::read_vector_u8(list, &mut list_pos)?;
            if name.is_empty() {
                return Err(Error::ParseError("Empty ALPN protocol name".to_string()));
            }
            protocols.push(name.to_vec());
        }

        Ok(Self { protocols })
    }

    /// The first protocol offered by the peer that we also support.
    pub fn select<'a>(&self, offered: &'a ProtocolNameList) -> Option<&'a [u8]> {
        offered
            .protocols
            .iter()
            .find(|p| self.protocols.contains(p))
            .map(|p| p.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpn_encoding() {
        let list = ProtocolNameList::new(vec![b"h3".to_vec()]);
        let extension = list.create_extension().unwrap();

        assert_eq!(extension.data, [0x00, 0x03, 0x02, b'h', b'3']);
        assert_eq!(ProtocolNameList::parse(&extension.data).unwrap(), list);
    }

    #[test]
    fn test_select_follows_client_order() {
        let ours = ProtocolNameList::new(vec![b"proto2".to_vec(), b"proto1".to_vec()]);
        let offered = ProtocolNameList::new(vec![b"proto1".to_vec(), b"proto2".to_vec()]);
        assert_eq!(ours.select(&offered), Some(&b"proto1"[..]));

        let none = ProtocolNameList::new(vec![b"other".to_vec()]);
        assert_eq!(ours.select(&none), None);
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(ProtocolNameList::parse(&[0x00, 0x01, 0x00]).is_err());
        assert!(ProtocolNameList::new(vec![vec![]]).create_extension().is_err());
    }
}
