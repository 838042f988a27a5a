use crate::error::{Error, Result};
use crate::utils;
use std::convert::TryFrom;
use std::fmt::Debug;

pub mod certificate;
pub mod certificate_verify;
pub mod client_hello;
pub mod encrypted_extensions;
pub mod extensions;
pub mod finished;
pub mod server_hello;

pub use certificate::{Certificate, CertificateEntry};
pub use certificate_verify::CertificateVerify;
pub use client_hello::ClientHello;
pub use encrypted_extensions::EncryptedExtensions;
pub use extensions::key_share::{KeyShareEntry, NamedGroup};
pub use extensions::{Extension, ExtensionType};
pub use finished::Finished;
pub use server_hello::ServerHello;

pub const LEGACY_VERSION: u16 = 0x0303;
pub const TLS13_VERSION: u16 = 0x0304;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeType {
    ClientHello = 1,
    ServerHello = 2,
    NewSessionTicket = 4,
    EndOfEarlyData = 5,
    EncryptedExtensions = 8,
    Certificate = 11,
    CertificateRequest = 13,
    CertificateVerify = 15,
    Finished = 20,
    KeyUpdate = 24,
    MessageHash = 254,
}

impl TryFrom<u8> for HandshakeType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(HandshakeType::ClientHello),
            2 => Ok(HandshakeType::ServerHello),
            4 => Ok(HandshakeType::NewSessionTicket),
            5 => Ok(HandshakeType::EndOfEarlyData),
            8 => Ok(HandshakeType::EncryptedExtensions),
            11 => Ok(HandshakeType::Certificate),
            13 => Ok(HandshakeType::CertificateRequest),
            15 => Ok(HandshakeType::CertificateVerify),
            20 => Ok(HandshakeType::Finished),
            24 => Ok(HandshakeType::KeyUpdate),
            254 => Ok(HandshakeType::MessageHash),
            _ => Err(Error::ParseError(format!(
                "Invalid HandshakeType value: {}",
                value
            ))),
        }
    }
}

pub trait HandshakeMessage: Debug {
    fn message_type(&self) -> HandshakeType;
    fn serialize(&self) -> Result<Vec<u8>>;

    /// The message body prefixed with its handshake header.
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let body = self.serialize()?;
        let mut result = HandshakeMessageHeader::new(self.message_type(), body.len() as u32).serialize()?;
        result.extend_from_slice(&body);
        Ok(result)
    }
}

#[derive(Debug)]
pub struct HandshakeMessageHeader {
    pub msg_type: HandshakeType,
    pub length: u32,
}

impl HandshakeMessageHeader {
    pub fn new(msg_type: HandshakeType, length: u32) -> Self {
        Self { msg_type, length }
    }

    pub fn parse(data: &[u8], pos: &mut usize) -> Result<Self> {
        if *pos + 4 > data.len() {
            return Err(Error::ParseError(
                "Handshake message header too short".to_string(),
            ));
        }

        let msg_type = HandshakeType::try_from(utils::read_u8(data, pos)?)?;
        let length = utils::read_u24(data, pos)?;

        Ok(Self { msg_type, length })
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut result = Vec::with_capacity(4);
        utils::write_u8(&mut result, self.msg_type as u8);
        utils::write_u24(&mut result, self.length)?;
        Ok(result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherSuite {
    TlsAes128GcmSha256 = 0x1301,
    TlsAes256GcmSha384 = 0x1302,
    TlsChacha20Poly1305Sha256 = 0x1303,
}

impl TryFrom<u16> for CipherSuite {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            0x1301 => Ok(CipherSuite::TlsAes128GcmSha256),
            0x1302 => Ok(CipherSuite::TlsAes256GcmSha384),
            0x1303 => Ok(CipherSuite::TlsChacha20Poly1305Sha256),
            _ => Err(Error::ParseError(format!("Invalid CipherSuite value: {:#06x}", value))),
        }
    }
}

impl CipherSuite {
    pub fn supported() -> Vec<CipherSuite> {
        vec![
            CipherSuite::TlsAes128GcmSha256,
            CipherSuite::TlsAes256GcmSha384,
            CipherSuite::TlsChacha20Poly1305Sha256,
        ]
    }
}

/// A parsed handshake message together with its framed encoding.
#[derive(Debug)]
pub enum Handshake {
    ClientHello(ClientHello),
    ServerHello(ServerHello),
    EncryptedExtensions(EncryptedExtensions),
    Certificate(Certificate),
    CertificateVerify(CertificateVerify),
    Finished(Finished),
}

impl Handshake {
    pub fn message_type(&self) -> HandshakeType {
        match self {
            Handshake::ClientHello(_) => HandshakeType::ClientHello,
            Handshake::ServerHello(_) => HandshakeType::ServerHello,
            Handshake::EncryptedExtensions(_) => HandshakeType::EncryptedExtensions,
            Handshake::Certificate(_) => HandshakeType::Certificate,
            Handshake::CertificateVerify(_) => HandshakeType::CertificateVerify,
            Handshake::Finished(_) => HandshakeType::Finished,
        }
    }
}

/// Reassembles handshake messages from CRYPTO stream bytes of one
/// encryption level. Data must arrive in order.
#[derive(Debug, Default)]
pub struct HandshakeLayer {
    buffer: Vec<u8>,
    offset: u64,
}

impl HandshakeLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends stream data starting at `offset`. Retransmitted prefixes are ignored.
    pub fn push(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset + data.len() as u64;
        if end <= self.offset {
            return Ok(());
        }
        if offset > self.offset {
            return Err(Error::ProtocolError(format!(
                "CRYPTO data at offset {} leaves a gap after {}",
                offset, self.offset
            )));
        }

        let skip = (self.offset - offset) as usize;
        self.buffer.extend_from_slice(&data[skip..]);
        self.offset = end;
        Ok(())
    }

    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Pops the next complete message, returning it and its raw bytes.
    pub fn next_message(&mut self) -> Result<Option<(Handshake, Vec<u8>)>> {
        if self.buffer.len() < 4 {
            return Ok(None);
        }

        let mut pos = 0;
        let header = HandshakeMessageHeader::parse(&self.buffer, &mut pos)?;
        let total = pos + header.length as usize;
        if total > self.buffer.len() {
            return Ok(None);
        }

        let raw: Vec<u8> = self.buffer.drain(..total).collect();
        let body = &raw[4..];
        let mut msg_pos = 0;

        let message = match header.msg_type {
            HandshakeType::ClientHello => {
                Handshake::ClientHello(ClientHello::parse(body, &mut msg_pos)?)
            }
            HandshakeType::ServerHello => {
                Handshake::ServerHello(ServerHello::parse(body, &mut msg_pos)?)
            }
            HandshakeType::EncryptedExtensions => {
                Handshake::EncryptedExtensions(EncryptedExtensions::parse(body, &mut msg_pos)?)
            }
            HandshakeType::Certificate => {
                Handshake::Certificate(Certificate::parse(body, &mut msg_pos)?)
            }
            HandshakeType::CertificateVerify => {
                Handshake::CertificateVerify(CertificateVerify::parse(body, &mut msg_pos)?)
            }
            HandshakeType::Finished => Handshake::Finished(Finished::parse(body, &mut msg_pos)?),
            other => {
                return Err(Error::ProtocolError(format!(
                    "Unexpected handshake message {:?}",
                    other
                )))
            }
        };

        if msg_pos != body.len() {
            return Err(Error::ParseError(format!(
                "Trailing bytes after {:?}",
                header.msg_type
            )));
        }

        Ok(Some((message, raw)))
    }
}
