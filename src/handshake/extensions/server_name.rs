// Server Name Indication (RFC 6066 section 3)
use crate::error::{Error, Result};
use crate::handshake::extensions::{Extension, ExtensionType};
use crate::utils;

const NAME_TYPE_HOST_NAME: u8 = 0;

pub fn create_extension(host_name: &str) -> Result<Extension> {
    let mut entry = Vec::with_capacity(3 + host_name.len());
    utils::write_u8(&mut entry, NAME_TYPE_HOST_NAME);
    utils::write_vector_u16(&mut entry, host_name.as_bytes())?;

    let mut data = Vec::with_capacity(2 + entry.len());
    utils::write_vector_u16(&mut data, &entry)?;
    Ok(Extension::new(ExtensionType::ServerName, data))
}

/// Returns the first host_name entry.
pub fn parse(data: &[u8]) -> Result<String> {
    let mut pos = 0;
    let list = utils::read_vector_u16(data, &mut pos)?;

    let mut list_pos = 0;
    while list_pos < list.len() {
        let name_type = utils::read_u8(list, &mut list_pos)?;
        let name = utils::read_vector_u16(list, &mut list_pos)?;
        if name_type == NAME_TYPE_HOST_NAME {
            return String::from_utf8(name.to_vec())
                .map_err(|_| Error::ParseError("Server name is not valid UTF-8".to_string()));
        }
    }

    Err(Error::ParseError("No host_name in server_name extension".to_string()))
}
