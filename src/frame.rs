// The frame subset the handshake needs (RFC 9000 section 19)
use crate::error::{Error, Result};
use crate::utils;
use bytes::Bytes;

const PADDING: u64 = 0x00;
const PING: u64 = 0x01;
const CRYPTO: u64 = 0x06;
const CONNECTION_CLOSE: u64 = 0x1c;
const APPLICATION_CLOSE: u64 = 0x1d;
const HANDSHAKE_DONE: u64 = 0x1e;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Padding { len: usize },
    Ping,
    Crypto { offset: u64, data: Bytes },
    ConnectionClose {
        error_code: u64,
        frame_type: u64,
        reason: Vec<u8>,
    },
    ApplicationClose { error_code: u64, reason: Vec<u8> },
    HandshakeDone,
}

impl Frame {
    pub fn parse(data: &[u8], pos: &mut usize) -> Result<Self> {
        let frame_type = utils::read_varint(data, pos)?;

        let frame = match frame_type {
            PADDING => {
                let mut len = 1;
                while *pos < data.len() && data[*pos] == 0 {
                    *pos += 1;
                    len += 1;
                }
                Frame::Padding { len }
            }
            PING => Frame::Ping,
            CRYPTO => {
                let offset = utils::read_varint(data, pos)?;
                let crypto_data = utils::read_vector_varint(data, pos)?;
                if offset + crypto_data.len() as u64 > utils::MAX_VARINT {
                    return Err(Error::ProtocolError("CRYPTO frame exceeds stream limit".to_string()));
                }
                Frame::Crypto {
                    offset,
                    data: Bytes::copy_from_slice(crypto_data),
                }
            }
            CONNECTION_CLOSE => Frame::ConnectionClose {
                error_code: utils::read_varint(data, pos)?,
                frame_type: utils::read_varint(data, pos)?,
                reason: utils::read_vector_varint(data, pos)?.to_vec(),
            },
            APPLICATION_CLOSE => Frame::ApplicationClose {
                error_code: utils::read_varint(data, pos)?,
                reason: utils::read_vector_varint(data, pos)?.to_vec(),
            },
            HANDSHAKE_DONE => Frame::HandshakeDone,
            other => {
                return Err(Error::ParseError(format!("Unsupported frame type {:#x}", other)));
            }
        };

        Ok(frame)
    }

    /// Parses every frame in a decrypted packet payload.
    pub fn parse_all(payload: &[u8]) -> Result<Vec<Frame>> {
        if payload.is_empty() {
            return Err(Error::ProtocolError("Packet carries no frames".to_string()));
        }

        let mut frames = Vec::new();
        let mut pos = 0;
        while pos < payload.len() {
            frames.push(Frame::parse(payload, &mut pos)?);
        }
        Ok(frames)
    }

    pub fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Frame::Padding { len } => out.resize(out.len() + len, 0),
            Frame::Ping => utils::write_varint(out, PING)?,
            Frame::Crypto { offset, data } => {
                utils::write_varint(out, CRYPTO)?;
                utils::write_varint(out, *offset)?;
                utils::write_vector_varint(out, data)?;
            }
            Frame::ConnectionClose {
                error_code,
                frame_type,
                reason,
            } => {
                utils::write_varint(out, CONNECTION_CLOSE)?;
                utils::write_varint(out, *error_code)?;
                utils::write_varint(out, *frame_type)?;
                utils::write_vector_varint(out, reason)?;
            }
            Frame::ApplicationClose { error_code, reason } => {
                utils::write_varint(out, APPLICATION_CLOSE)?;
                utils::write_varint(out, *error_code)?;
                utils::write_vector_varint(out, reason)?;
            }
            Frame::HandshakeDone => utils::write_varint(out, HANDSHAKE_DONE)?,
        }
        Ok(())
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            Frame::Padding { len } => *len,
            Frame::Ping | Frame::HandshakeDone => 1,
            Frame::Crypto { offset, data } => {
                1 + utils::varint_len(*offset)
                    + utils::varint_len(data.len() as u64)
                    + data.len()
            }
            Frame::ConnectionClose {
                error_code,
                frame_type,
                reason,
            } => {
                1 + utils::varint_len(*error_code)
                    + utils::varint_len(*frame_type)
                    + utils::varint_len(reason.len() as u64)
                    + reason.len()
            }
            Frame::ApplicationClose { error_code, reason } => {
                1 + utils::varint_len(*error_code)
                    + utils::varint_len(reason.len() as u64)
                    + reason.len()
            }
        }
    }

    /// Frames that elicit no reply and do not count toward handshake progress.
    pub fn is_padding(&self) -> bool {
        matches!(self, Frame::Padding { .. })
    }
}

/// Room for CRYPTO payload when `available` bytes remain in the packet.
pub fn max_crypto_data(offset: u64, available: usize) -> usize {
    // Type byte, offset, and a length prefix sized for the worst case
    let overhead = 1 + utils::varint_len(offset) + utils::varint_len(available as u64);
    available.saturating_sub(overhead)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_frame() {
        let frame = Frame::Crypto {
            offset: 64,
            data: Bytes::from_static(b"hello"),
        };

        let mut out = Vec::new();
        frame.encode(&mut out).unwrap();
        assert_eq!(out, [0x06, 0x40, 0x40, 0x05, b'h', b'e', b'l', b'l', b'o']);
        assert_eq!(frame.encoded_len(), out.len());

        let mut pos = 0;
        assert_eq!(Frame::parse(&out, &mut pos).unwrap(), frame);
    }

    #[test]
    fn test_padding_is_coalesced() {
        let payload = [0x01, 0x00, 0x00, 0x00, 0x1e];
        let frames = Frame::parse_all(&payload).unwrap();

        assert_eq!(frames, vec![Frame::Ping, Frame::Padding { len: 3 }, Frame::HandshakeDone]);
    }

    #[test]
    fn test_connection_close() {
        let payload = [0x1c, 0x41, 0x28, 0x06, 0x03, b'b', b'a', b'd'];
        let frames = Frame::parse_all(&payload).unwrap();

        assert_eq!(
            frames,
            vec![Frame::ConnectionClose {
                error_code: 0x128,
                frame_type: 0x06,
                reason: b"bad".to_vec(),
            }]
        );
    }

    #[test]
    fn test_unknown_and_empty() {
        assert!(Frame::parse_all(&[0x08]).is_err());
        assert!(Frame::parse_all(&[]).is_err());
        // Truncated CRYPTO length
        assert!(Frame::parse_all(&[0x06, 0x00, 0x05, 0x01]).is_err());
    }

    #[test]
    fn test_max_crypto_data() {
        // 1 type byte, 1 offset byte, 2 length bytes
        assert_eq!(max_crypto_data(0, 100), 96);
        assert_eq!(max_crypto_data(0, 2), 0);
    }
}
