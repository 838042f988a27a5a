// Packet framing and protection.
//
// Long header: flags | version | dcid len | dcid | scid len | scid
//              [token len | token] (Initial only) | length | packet number
// Short header: flags | dcid | packet number
//
// Packet numbers are always sent in 4 bytes and headers are not protected;
// the whole header is the AEAD associated data.
use crate::crypto::PacketKey;
use crate::error::{Error, Result};
use crate::utils;
use crate::{MAX_CONN_ID_LEN, PROTOCOL_VERSION};
use std::fmt;

const FORM_BIT: u8 = 0x80;
const FIXED_BIT: u8 = 0x40;
const PN_LEN: usize = 4;

/// Largest long header payload we build, so the length field fits two bytes.
const MAX_LONG_LENGTH: usize = 16383;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EncryptionLevel {
    Initial,
    Handshake,
    OneRtt,
}

impl EncryptionLevel {
    pub const ALL: [EncryptionLevel; 3] = [
        EncryptionLevel::Initial,
        EncryptionLevel::Handshake,
        EncryptionLevel::OneRtt,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for EncryptionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionLevel::Initial => write!(f, "Initial"),
            EncryptionLevel::Handshake => write!(f, "Handshake"),
            EncryptionLevel::OneRtt => write!(f, "1-RTT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Initial = 0x00,
    ZeroRtt = 0x01,
    Handshake = 0x02,
    Retry = 0x03,
    Short = 0xFF,
}

impl PacketType {
    pub fn level(&self) -> Result<EncryptionLevel> {
        match self {
            PacketType::Initial => Ok(EncryptionLevel::Initial),
            PacketType::Handshake => Ok(EncryptionLevel::Handshake),
            PacketType::Short => Ok(EncryptionLevel::OneRtt),
            other => Err(Error::ProtocolError(format!("Unsupported packet type {:?}", other))),
        }
    }

    pub fn for_level(level: EncryptionLevel) -> Self {
        match level {
            EncryptionLevel::Initial => PacketType::Initial,
            EncryptionLevel::Handshake => PacketType::Handshake,
            EncryptionLevel::OneRtt => PacketType::Short,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub packet_type: PacketType,
    pub version: u32,
    pub dcid: Vec<u8>,
    pub scid: Vec<u8>,
    pub token: Vec<u8>,
}

fn read_connection_id(data: &[u8], pos: &mut usize) -> Result<Vec<u8>> {
    let cid = utils::read_vector_u8(data, pos)?;
    if cid.len() > MAX_CONN_ID_LEN {
        return Err(Error::InvalidConnectionId(format!(
            "Connection id of {} bytes exceeds {}",
            cid.len(),
            MAX_CONN_ID_LEN
        )));
    }
    Ok(cid.to_vec())
}

/// A packet whose header has been parsed but whose payload is still sealed.
#[derive(Debug)]
pub struct SealedPacket<'a> {
    pub header: Header,
    pub packet_number: u64,
    /// Header bytes through the packet number.
    pub aad: &'a [u8],
    pub ciphertext: &'a [u8],
    /// Total bytes this packet occupies in the input.
    pub len: usize,
}

impl<'a> SealedPacket<'a> {
    /// Parses the first packet in `data`. `local_cid_len` is needed to
    /// delimit the destination id of short header packets.
    pub fn parse(data: &'a [u8], local_cid_len: usize) -> Result<Self> {
        let mut pos = 0;
        let first = utils::read_u8(data, &mut pos)?;

        if first & FIXED_BIT == 0 {
            return Err(Error::ParseError("Fixed bit not set".to_string()));
        }

        if first & FORM_BIT == 0 {
            let dcid = utils::read_bytes(data, &mut pos, local_cid_len)?.to_vec();
            let packet_number = u64::from(utils::read_u32(data, &mut pos)?);
            let aad = &data[..pos];
            let ciphertext = &data[pos..];

            return Ok(Self {
                header: Header {
                    packet_type: PacketType::Short,
                    version: PROTOCOL_VERSION,
                    dcid,
                    scid: Vec::new(),
                    token: Vec::new(),
                },
                packet_number,
                aad,
                ciphertext,
                len: data.len(),
            });
        }

        let version = utils::read_u32(data, &mut pos)?;
        if version != PROTOCOL_VERSION {
            return Err(Error::UnknownVersion(version));
        }

        let packet_type = match (first >> 4) & 0x03 {
            0x00 => PacketType::Initial,
            0x01 => PacketType::ZeroRtt,
            0x02 => PacketType::Handshake,
            _ => PacketType::Retry,
        };

        let dcid = read_connection_id(data, &mut pos)?;
        let scid = read_connection_id(data, &mut pos)?;

        let token = if packet_type == PacketType::Initial {
            utils::read_vector_varint(data, &mut pos)?.to_vec()
        } else {
            Vec::new()
        };

        if packet_type == PacketType::Retry || packet_type == PacketType::ZeroRtt {
            return Err(Error::ProtocolError(format!(
                "Unsupported packet type {:?}",
                packet_type
            )));
        }

        let length = utils::read_varint(data, &mut pos)? as usize;
        if length < PN_LEN || pos + length > data.len() {
            return Err(Error::ParseError(format!(
                "Packet length {} exceeds available data",
                length
            )));
        }

        let end = pos + length;
        let packet_number = u64::from(utils::read_u32(data, &mut pos)?);
        let aad = &data[..pos];
        let ciphertext = &data[pos..end];

        Ok(Self {
            header: Header {
                packet_type,
                version,
                dcid,
                scid,
                token,
            },
            packet_number,
            aad,
            ciphertext,
            len: end,
        })
    }

    pub fn open(&self, key: &PacketKey) -> Result<Vec<u8>> {
        key.open(self.packet_number, self.aad, self.ciphertext)
    }
}

/// Bytes of header written for a packet of this type.
pub fn header_len(packet_type: PacketType, dcid: &[u8], scid: &[u8]) -> usize {
    match packet_type {
        PacketType::Short => 1 + dcid.len() + PN_LEN,
        PacketType::Initial => 1 + 4 + 1 + dcid.len() + 1 + scid.len() + 1 + 2 + PN_LEN,
        _ => 1 + 4 + 1 + dcid.len() + 1 + scid.len() + 2 + PN_LEN,
    }
}

/// Largest plaintext payload that fits a packet of at most `max_len` bytes.
pub fn max_payload_len(
    packet_type: PacketType,
    dcid: &[u8],
    scid: &[u8],
    tag_len: usize,
    max_len: usize,
) -> usize {
    let overhead = header_len(packet_type, dcid, scid) + tag_len;
    let available = max_len.saturating_sub(overhead);

    if packet_type == PacketType::Short {
        available
    } else {
        available.min(MAX_LONG_LENGTH - PN_LEN - tag_len)
    }
}

/// Seals `payload` into a packet appended to `out`, returning its length.
pub fn write_packet(
    out: &mut Vec<u8>,
    packet_type: PacketType,
    dcid: &[u8],
    scid: &[u8],
    packet_number: u64,
    payload: &[u8],
    key: &PacketKey,
) -> Result<usize> {
    let start = out.len();
    let pn = u32::try_from(packet_number)
        .map_err(|_| Error::ProtocolError("Packet number space exhausted".to_string()))?;

    if packet_type == PacketType::Short {
        utils::write_u8(out, FIXED_BIT | (PN_LEN as u8 - 1));
        out.extend_from_slice(dcid);
    } else {
        let length = PN_LEN + payload.len() + key.tag_len();
        if length > MAX_LONG_LENGTH {
            return Err(Error::ProtocolError(format!("Packet length {} too large", length)));
        }

        utils::write_u8(
            out,
            FORM_BIT | FIXED_BIT | ((packet_type as u8) << 4) | (PN_LEN as u8 - 1),
        );
        utils::write_u32(out, PROTOCOL_VERSION);
        utils::write_vector_u8(out, dcid)?;
        utils::write_vector_u8(out, scid)?;
        if packet_type == PacketType::Initial {
            utils::write_varint(out, 0)?;
        }
        // Always two bytes so the header size is known up front
        utils::write_u16(out, 0x4000 | length as u16);
    }
    utils::write_u32(out, pn);

    let sealed = key.seal(packet_number, &out[start..], payload)?;
    out.extend_from_slice(&sealed);

    Ok(out.len() - start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake::CipherSuite;

    fn key() -> PacketKey {
        PacketKey::new(CipherSuite::TlsAes128GcmSha256, &[0x33; 32]).unwrap()
    }

    #[test]
    fn test_initial_packet_layout() {
        let mut out = Vec::new();
        let dcid = [0xAA; 8];
        let scid = [1, 0, 0, 0];
        let written =
            write_packet(&mut out, PacketType::Initial, &dcid, &scid, 0, b"payload", &key()).unwrap();

        assert_eq!(written, out.len());
        assert_eq!(written, header_len(PacketType::Initial, &dcid, &scid) + 7 + 16);
        assert_eq!(out[0], 0xC3);
        assert_eq!(&out[1..5], &[0x00, 0x00, 0x00, 0x01]);

        let packet = SealedPacket::parse(&out, 4).unwrap();
        assert_eq!(packet.header.packet_type, PacketType::Initial);
        assert_eq!(packet.header.dcid, dcid);
        assert_eq!(packet.header.scid, scid);
        assert_eq!(packet.len, written);
        assert_eq!(packet.open(&key()).unwrap(), b"payload");
    }

    #[test]
    fn test_coalesced_packets_are_delimited() {
        let mut out = Vec::new();
        let first = write_packet(&mut out, PacketType::Initial, &[2; 4], &[1; 4], 0, b"a", &key()).unwrap();
        write_packet(&mut out, PacketType::Handshake, &[2; 4], &[1; 4], 0, b"bc", &key()).unwrap();

        let packet = SealedPacket::parse(&out, 4).unwrap();
        assert_eq!(packet.len, first);

        let second = SealedPacket::parse(&out[first..], 4).unwrap();
        assert_eq!(second.header.packet_type, PacketType::Handshake);
        assert_eq!(second.open(&key()).unwrap(), b"bc");
    }

    #[test]
    fn test_short_header() {
        let mut out = Vec::new();
        write_packet(&mut out, PacketType::Short, &[9; 4], &[], 3, b"\x1e", &key()).unwrap();

        let packet = SealedPacket::parse(&out, 4).unwrap();
        assert_eq!(packet.header.packet_type, PacketType::Short);
        assert_eq!(packet.packet_number, 3);
        assert_eq!(packet.open(&key()).unwrap(), b"\x1e");
    }

    #[test]
    fn test_unknown_version() {
        let mut out = Vec::new();
        write_packet(&mut out, PacketType::Handshake, &[2; 4], &[1; 4], 0, b"a", &key()).unwrap();
        out[4] = 0x02;

        assert!(matches!(SealedPacket::parse(&out, 4), Err(Error::UnknownVersion(2))));
    }

    #[test]
    fn test_tampered_header_fails_open() {
        let mut out = Vec::new();
        write_packet(&mut out, PacketType::Handshake, &[2; 4], &[1; 4], 0, b"abc", &key()).unwrap();
        out[7] ^= 0x01; // inside the dcid

        let packet = SealedPacket::parse(&out, 4).unwrap();
        assert!(packet.open(&key()).is_err());
    }

    #[test]
    fn test_truncated_length() {
        let mut out = Vec::new();
        write_packet(&mut out, PacketType::Handshake, &[2; 4], &[1; 4], 0, b"abc", &key()).unwrap();
        out.truncate(out.len() - 1);

        assert!(SealedPacket::parse(&out, 4).is_err());
    }

    #[test]
    fn test_max_payload_len() {
        let dcid = [0u8; 8];
        let scid = [0u8; 4];
        let max = max_payload_len(PacketType::Initial, &dcid, &scid, 16, 1200);
        assert_eq!(max + header_len(PacketType::Initial, &dcid, &scid) + 16, 1200);
        assert_eq!(max_payload_len(PacketType::Initial, &dcid, &scid, 16, 10), 0);
    }
}
