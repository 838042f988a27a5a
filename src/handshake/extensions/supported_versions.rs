use crate::error::{Error, Result};
use crate::handshake::extensions::{Extension, ExtensionType};
use crate::handshake::TLS13_VERSION;
use crate::utils;

pub struct SupportedVersions {
    pub versions: Vec<u16>,
}

impl SupportedVersions {
    pub fn new(versions: Vec<u16>) -> Self {
        Self { versions }
    }

    pub fn create_extension(&self) -> Result<Extension> {
        let mut list = Vec::with_capacity(self.versions.len() * 2);
        for version in &self.versions {
            utils::write_u16(&mut list, *version);
        }

        let mut data = Vec::with_capacity(1 + list.len());
        utils::write_vector_u8(&mut data, &list)?;
        Ok(Extension::new(ExtensionType::SupportedVersions, data))
    }

    pub fn create_server_extension(selected_version: u16) -> Extension {
        let mut data = Vec::new();
        utils::write_u16(&mut data, selected_version);
        Extension::new(ExtensionType::SupportedVersions, data)
    }

    pub fn parse_client(data: &[u8], pos: &mut usize) -> Result<Self> {
        let list = utils::read_vector_u8(data, pos)?;
        if list.len() % 2 != 0 {
            return Err(Error::ParseError("SupportedVersions list length must be even".to_string()));
        }

        let versions = list
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();

        Ok(Self { versions })
    }

    pub fn parse_server(data: &[u8], pos: &mut usize) -> Result<u16> {
        utils::read_u16(data, pos)
    }

    pub fn supports_tls13(&self) -> bool {
        self.versions.contains(&TLS13_VERSION)
    }
}
