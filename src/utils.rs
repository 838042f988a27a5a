use crate::error::{Error, Result};

/// Largest value a QUIC variable-length integer can carry (2^62 - 1).
pub const MAX_VARINT: u64 = (1 << 62) - 1;

pub fn read_u8(data: &[u8], pos: &mut usize) -> Result<u8> {
    if *pos >= data.len() {
        return Err(Error::ParseError("Unexpected end of data while reading u8".to_string()));
    }

    let value = data[*pos];
    *pos += 1;
    Ok(value)
}

pub fn read_u16(data: &[u8], pos: &mut usize) -> Result<u16> {
    if *pos + 2 > data.len() {
        return Err(Error::ParseError("Unexpected end of data while reading u16".to_string()));
    }

    let value = u16::from_be_bytes([data[*pos], data[*pos + 1]]);
    *pos += 2;
    Ok(value)
}

pub fn read_u24(data: &[u8], pos: &mut usize) -> Result<u32> {
    if *pos + 3 > data.len() {
        return Err(Error::ParseError("Unexpected end of data while reading u24".to_string()));
    }

    let value = u32::from_be_bytes([0, data[*pos], data[*pos + 1], data[*pos + 2]]);
    *pos += 3;
    Ok(value)
}

pub fn read_u32(data: &[u8], pos: &mut usize) -> Result<u32> {
    let bytes = read_bytes(data, pos, 4)?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub fn read_bytes<'a>(data: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8]> {
    if *pos + len > data.len() {
        return Err(Error::ParseError(format!(
            "Unexpected end of data while reading {} bytes", len
        )));
    }

    let bytes = &data[*pos..*pos + len];
    *pos += len;
    Ok(bytes)
}

pub fn read_vector_u8<'a>(data: &'a [u8], pos: &mut usize) -> Result<&'a [u8]> {
    let len = read_u8(data, pos)? as usize;
    read_bytes(data, pos, len)
}

pub fn read_vector_u16<'a>(data: &'a [u8], pos: &mut usize) -> Result<&'a [u8]> {
    let len = read_u16(data, pos)? as usize;
    read_bytes(data, pos, len)
}

pub fn read_vector_u24<'a>(data: &'a [u8], pos: &mut usize) -> Result<&'a [u8]> {
    let len = read_u24(data, pos)? as usize;
    read_bytes(data, pos, len)
}

/// Number of bytes the varint encoding of `value` occupies.
pub const fn varint_len(value: u64) -> usize {
    if value <= 63 {
        1
    } else if value <= 16383 {
        2
    } else if value <= 1_073_741_823 {
        4
    } else {
        8
    }
}

pub fn read_varint(data: &[u8], pos: &mut usize) -> Result<u64> {
    let first = read_u8(data, pos)?;
    let len = 1usize << (first >> 6);
    let rest = read_bytes(data, pos, len - 1)?;

    let mut value = u64::from(first & 0x3f);
    for byte in rest {
        value = (value << 8) | u64::from(*byte);
    }
    Ok(value)
}

pub fn read_vector_varint<'a>(data: &'a [u8], pos: &mut usize) -> Result<&'a [u8]> {
    let len = read_varint(data, pos)? as usize;
    read_bytes(data, pos, len)
}

pub fn write_u8(vec: &mut Vec<u8>, value: u8) {
    vec.push(value);
}

pub fn write_u16(vec: &mut Vec<u8>, value: u16) {
    vec.extend_from_slice(&value.to_be_bytes());
}

pub fn write_u24(vec: &mut Vec<u8>, value: u32) -> Result<()> {
    if value > 0xFF_FFFF {
        return Err(Error::ProtocolError(format!("Value {} too large for u24", value)));
    }
    let bytes = value.to_be_bytes();
    vec.extend_from_slice(&bytes[1..4]);
    Ok(())
}

pub fn write_u32(vec: &mut Vec<u8>, value: u32) {
    vec.extend_from_slice(&value.to_be_bytes());
}

pub fn write_vector_u8(vec: &mut Vec<u8>, data: &[u8]) -> Result<()> {
    if data.len() > 255 {
        return Err(Error::ProtocolError("Data too large for u8 length prefix".to_string()));
    }
    write_u8(vec, data.len() as u8);
    vec.extend_from_slice(data);
    Ok(())
}

pub fn write_vector_u16(vec: &mut Vec<u8>, data: &[u8]) -> Result<()> {
    if data.len() > 65535 {
        return Err(Error::ProtocolError("Data too large for u16 length prefix".to_string()));
    }
    write_u16(vec, data.len() as u16);
    vec.extend_from_slice(data);
    Ok(())
}

pub fn write_vector_u24(vec: &mut Vec<u8>, data: &[u8]) -> Result<()> {
    write_u24(vec, data.len() as u32)?;
    vec.extend_from_slice(data);
    Ok(())
}

pub fn write_varint(vec: &mut Vec<u8>, value: u64) -> Result<()> {
    match varint_len(value) {
        1 => vec.push(value as u8),
        2 => vec.extend_from_slice(&((value as u16) | 0x4000).to_be_bytes()),
        4 => vec.extend_from_slice(&((value as u32) | 0x8000_0000).to_be_bytes()),
        _ => {
            if value > MAX_VARINT {
                return Err(Error::ProtocolError(format!("Value {} too large for varint", value)));
            }
            vec.extend_from_slice(&(value | 0xC000_0000_0000_0000).to_be_bytes());
        }
    }
    Ok(())
}

pub fn write_vector_varint(vec: &mut Vec<u8>, data: &[u8]) -> Result<()> {
    write_varint(vec, data.len() as u64)?;
    vec.extend_from_slice(data);
    Ok(())
}
