use crate::error::{Error, Result};
use crate::handshake::extensions::{Extension, ExtensionType};
use crate::utils;
use std::convert::TryFrom;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedGroup {
    Secp256r1 = 0x0017,
    Secp384r1 = 0x0018,
    Secp521r1 = 0x0019,
    X25519 = 0x001D,
    X448 = 0x001E,
    Ffdhe2048 = 0x0100,
    Ffdhe3072 = 0x0101,
    Ffdhe4096 = 0x0102,
    Ffdhe6144 = 0x0103,
    Ffdhe8192 = 0x0104,
}

impl TryFrom<u16> for NamedGroup {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            0x0017 => Ok(NamedGroup::Secp256r1),
            0x0018 => Ok(NamedGroup::Secp384r1),
            0x0019 => Ok(NamedGroup::Secp521r1),
            0x001D => Ok(NamedGroup::X25519),
            0x001E => Ok(NamedGroup::X448),
            0x0100 => Ok(NamedGroup::Ffdhe2048),
            0x0101 => Ok(NamedGroup::Ffdhe3072),
            0x0102 => Ok(NamedGroup::Ffdhe4096),
            0x0103 => Ok(NamedGroup::Ffdhe6144),
            0x0104 => Ok(NamedGroup::Ffdhe8192),
            _ => Err(Error::ParseError(format!("Invalid NamedGroup value: {:#06x}", value))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KeyShareEntry {
    pub group: NamedGroup,
    pub key_exchange: Vec<u8>,
}

impl KeyShareEntry {
    pub fn new(group: NamedGroup, key_exchange: Vec<u8>) -> Self {
        Self { group, key_exchange }
    }

    pub fn parse(data: &[u8], pos: &mut usize) -> Result<Self> {
        if *pos + 4 > data.len() {
            return Err(Error::ParseError("KeyShareEntry too short".to_string()));
        }

        let group = NamedGroup::try_from(utils::read_u16(data, pos)?)?;
        let key_exchange = utils::read_vector_u16(data, pos)?.to_vec();

        Ok(Self { group, key_exchange })
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut result = Vec::with_capacity(4 + self.key_exchange.len());
        utils::write_u16(&mut result, self.group as u16);
        utils::write_vector_u16(&mut result, &self.key_exchange)?;
        Ok(result)
    }
}

/// ClientHello form: a list of shares.
pub fn client_extension(entries: &[KeyShareEntry]) -> Result<Extension> {
    let mut shares = Vec::new();
    for entry in entries {
        shares.extend_from_slice(&entry.serialize()?);
    }

    let mut data = Vec::with_capacity(2 + shares.len());
    utils::write_vector_u16(&mut data, &shares)?;
    Ok(Extension::new(ExtensionType::KeyShare, data))
}

pub fn parse_client_extension(data: &[u8]) -> Result<Vec<KeyShareEntry>> {
    let mut pos = 0;
    let shares = utils::read_vector_u16(data, &mut pos)?;

    let mut entries = Vec::new();
    let mut share_pos = 0;
    while share_pos < shares.len() {
        entries.push(KeyShareEntry::parse(shares, &mut share_pos)?);
    }
    Ok(entries)
}

/// ServerHello form: exactly one share.
pub fn server_extension(entry: &KeyShareEntry) -> Result<Extension> {
    Ok(Extension::new(ExtensionType::KeyShare, entry.serialize()?))
}

pub fn parse_server_extension(data: &[u8]) -> Result<KeyShareEntry> {
    let mut pos = 0;
    let entry = KeyShareEntry::parse(data, &mut pos)?;
    if pos != data.len() {
        return Err(Error::ParseError("Trailing bytes in server key_share".to_string()));
    }
    Ok(entry)
}

pub fn supported_groups_extension(groups: &[NamedGroup]) -> Result<Extension> {
    let mut list = Vec::with_capacity(groups.len() * 2);
    for group in groups {
        utils::write_u16(&mut list, *group as u16);
    }

    let mut data = Vec::with_capacity(2 + list.len());
    utils::write_vector_u16(&mut data, &list)?;
    Ok(Extension::new(ExtensionType::SupportedGroups, data))
}
