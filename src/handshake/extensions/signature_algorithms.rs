use crate::crypto::signature::SignatureScheme;
use crate::error::{Error, Result};
use crate::handshake::extensions::{Extension, ExtensionType};
use crate::utils;
use std::convert::TryFrom;

pub fn create_extension(schemes: &[SignatureScheme]) -> Result<Extension> {
    let mut list = Vec::with_capacity(schemes.len() * 2);
    for scheme in schemes {
        utils::write_u16(&mut list, *scheme as u16);
    }

    let mut data = Vec::with_capacity(2 + list.len());
    utils::write_vector_u16(&mut data, &list)?;
    Ok(Extension::new(ExtensionType::SignatureAlgorithms, data))
}

/// Parses the offered schemes, skipping code points we do not know.
pub fn parse(data: &[u8]) -> Result<Vec<SignatureScheme>> {
    let mut pos = 0;
    let list = utils::read_vector_u16(data, &mut pos)?;
    if list.len() % 2 != 0 {
        return Err(Error::ParseError("Signature algorithm list length must be even".to_string()));
    }

    Ok(list
        .chunks_exact(2)
        .filter_map(|pair| SignatureScheme::try_from(u16::from_be_bytes([pair[0], pair[1]])).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_schemes_skipped() {
        let data = [0x00, 0x04, 0x04, 0x03, 0xFE, 0xFE];
        assert_eq!(parse(&data).unwrap(), vec![SignatureScheme::EcdsaSecp256r1Sha256]);
    }

    #[test]
    fn test_encoding() {
        let extension = create_extension(&[SignatureScheme::Ed25519]).unwrap();
        assert_eq!(extension.data, [0x00, 0x02, 0x08, 0x07]);
    }
}
