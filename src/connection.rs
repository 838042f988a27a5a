//! A handshake-only QUIC connection driven through [`Endpoint`].
//!
//! Each `ingest` call consumes exactly one packet from the front of the
//! datagram and each `emit` call writes exactly one packet. Packets of every
//! level are sealed with the keys the TLS layer installs; there is no header
//! protection, no acknowledgement and no loss recovery.

use crate::config::Config;
use crate::crypto::{self, hkdf, PacketKey, TrafficSecrets};
use crate::diagnostics::DebugSink;
use crate::endpoint::{Endpoint, Progress, Role};
use crate::error::{Error, Result};
use crate::frame::{self, Frame};
use crate::handshake::{CipherSuite, HandshakeLayer};
use crate::packet::{self, EncryptionLevel, PacketType, SealedPacket};
use crate::state::{ClientParams, HandshakeAction, HandshakeState, ServerParams};
use crate::transport_params::{TransportParams, MIN_UDP_PAYLOAD_SIZE};
use crate::MAX_CONN_ID_LEN;
use bytes::BytesMut;
use std::fmt;
use std::sync::Arc;

/// Length of the random destination id a client picks for its first flight.
const ORIGINAL_DCID_LEN: usize = 8;

/// Client Initial datagrams are padded to this size.
const MIN_INITIAL_DATAGRAM: usize = MIN_UDP_PAYLOAD_SIZE as usize;

/// CONNECTION_CLOSE error code for an application close sent before 1-RTT.
const APPLICATION_ERROR: u64 = 0x0c;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub recv: usize,
    pub sent: usize,
    pub recv_bytes: u64,
    pub sent_bytes: u64,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "recv={} sent={} recv_bytes={} sent_bytes={}",
            self.recv, self.sent, self.recv_bytes, self.sent_bytes
        )
    }
}

struct DirectionalKeys {
    seal: PacketKey,
    open: PacketKey,
}

#[derive(Default)]
struct PacketSpace {
    keys: Option<DirectionalKeys>,
    next_packet_number: u64,
    largest_received: Option<u64>,
    crypto_send: BytesMut,
    crypto_send_offset: u64,
    crypto_recv: HandshakeLayer,
}

enum CloseState {
    Open,
    /// A CONNECTION_CLOSE is queued for the next emit.
    Closing(Frame),
    Closed,
}

pub struct Connection {
    role: Role,
    scid: Vec<u8>,
    /// Where our packets go. For a client this starts as the random
    /// original id and is replaced by the server's id.
    dcid: Vec<u8>,
    original_dcid: Option<Vec<u8>>,
    peer_cid: Option<Vec<u8>>,
    handshake: HandshakeState,
    spaces: [PacketSpace; 3],
    established: bool,
    handshake_done_pending: bool,
    peer_params_checked: bool,
    /// Set once a short header packet or a close is written; nothing may
    /// follow it in the same datagram. The next emit ends the batch.
    datagram_ended: bool,
    close_state: CloseState,
    max_send_udp_payload_size: usize,
    peer_max_udp_payload_size: usize,
    stats: Stats,
    debug_sink: Option<Arc<dyn DebugSink>>,
}

fn check_connection_id(cid: &[u8]) -> Result<()> {
    if cid.is_empty() || cid.len() > MAX_CONN_ID_LEN {
        return Err(Error::InvalidConnectionId(format!(
            "Source connection id must be 1 to {} bytes, got {}",
            MAX_CONN_ID_LEN,
            cid.len()
        )));
    }
    Ok(())
}

impl Connection {
    /// Creates the initiating side. An empty or absent server name skips SNI.
    pub fn connect(server_name: Option<&str>, scid: &[u8], config: &Config) -> Result<Self> {
        check_connection_id(scid)?;

        let original_dcid = crypto::random_bytes(ORIGINAL_DCID_LEN)?;

        let transport_params = TransportParams {
            initial_source_connection_id: Some(scid.to_vec()),
            ..config.transport_params()
        };
        let handshake = HandshakeState::new_client(ClientParams {
            server_name: server_name.filter(|name| !name.is_empty()).map(str::to_string),
            application_protocols: config.application_protocols().to_vec(),
            transport_params: transport_params.encode(false)?,
            verify_peer: config.verify_peer(),
            trust_store: config.trust_store().cloned(),
        })?;

        let mut conn = Self::new(Role::Initiator, scid, original_dcid.clone(), handshake, config);
        conn.original_dcid = Some(original_dcid.clone());
        conn.install_initial_keys(&original_dcid)?;

        let actions = conn.handshake.start()?;
        conn.apply_actions(actions)?;
        conn.trace(format_args!(
            "created, original dcid {}",
            hex::encode(&original_dcid)
        ));

        Ok(conn)
    }

    /// Creates the responding side. `odcid`, when given and non-empty, is
    /// the id advertised as original_destination_connection_id; otherwise
    /// the destination id of the client's first Initial is used.
    pub fn accept(scid: &[u8], odcid: Option<&[u8]>, config: &Config) -> Result<Self> {
        check_connection_id(scid)?;

        let credentials = config.credentials().cloned().ok_or_else(|| {
            Error::CertificateError("Responder requires a certificate chain and private key".to_string())
        })?;

        let transport_params = TransportParams {
            original_destination_connection_id: odcid
                .filter(|id| !id.is_empty())
                .map(<[u8]>::to_vec),
            initial_source_connection_id: Some(scid.to_vec()),
            ..config.transport_params()
        };
        let handshake = HandshakeState::new_server(ServerParams {
            credentials,
            application_protocols: config.application_protocols().to_vec(),
            transport_params,
        });

        let conn = Self::new(Role::Responder, scid, Vec::new(), handshake, config);
        conn.trace(format_args!("created"));
        Ok(conn)
    }

    fn new(role: Role, scid: &[u8], dcid: Vec<u8>, handshake: HandshakeState, config: &Config) -> Self {
        Self {
            role,
            scid: scid.to_vec(),
            dcid,
            original_dcid: None,
            peer_cid: None,
            handshake,
            spaces: Default::default(),
            established: false,
            handshake_done_pending: false,
            peer_params_checked: false,
            datagram_ended: false,
            close_state: CloseState::Open,
            max_send_udp_payload_size: config.max_send_udp_payload_size(),
            peer_max_udp_payload_size: usize::MAX,
            stats: Stats::default(),
            debug_sink: config.debug_sink().cloned(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_established(&self) -> bool {
        self.established
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.close_state, CloseState::Closed)
    }

    pub fn application_proto(&self) -> Option<&[u8]> {
        self.handshake.application_protocol()
    }

    pub fn source_connection_id(&self) -> &[u8] {
        &self.scid
    }

    /// The peer's id, once learned from its first packet.
    pub fn peer_connection_id(&self) -> Option<&[u8]> {
        self.peer_cid.as_deref()
    }

    pub fn peer_transport_params(&self) -> Option<&TransportParams> {
        self.handshake.peer_transport_params()
    }

    pub fn negotiated_cipher_suite(&self) -> Option<CipherSuite> {
        self.handshake.get_selected_cipher_suite()
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Queues a CONNECTION_CLOSE. The connection is closed once it is sent.
    pub fn close(&mut self, app: bool, err: u64, reason: &[u8]) -> Result<()> {
        if !matches!(self.close_state, CloseState::Open) {
            return Err(Error::InvalidState("Connection is already closing".to_string()));
        }

        if self.close_level().is_none() {
            self.trace(format_args!("closed before any keys were available"));
            self.close_state = CloseState::Closed;
            return Ok(());
        }

        let frame = if app && self.established {
            Frame::ApplicationClose {
                error_code: err,
                reason: reason.to_vec(),
            }
        } else if app {
            // Application codes and reasons are not exposed before 1-RTT
            Frame::ConnectionClose {
                error_code: APPLICATION_ERROR,
                frame_type: 0,
                reason: Vec::new(),
            }
        } else {
            Frame::ConnectionClose {
                error_code: err,
                frame_type: 0,
                reason: reason.to_vec(),
            }
        };

        self.trace(format_args!("close queued: {:?}", frame));
        self.close_state = CloseState::Closing(frame);
        Ok(())
    }

    pub fn ingest(&mut self, data: &[u8]) -> Result<Progress> {
        self.datagram_ended = false;

        if data.is_empty() || !matches!(self.close_state, CloseState::Open) {
            return Ok(Progress::NoProgress);
        }

        match self.process_packet(data) {
            Ok(len) => Ok(Progress::Progressed(len)),
            Err(Error::PeerClosed { code, reason }) => {
                self.trace(format_args!("peer closed with {:#x}: {}", code, reason));
                self.close_state = CloseState::Closed;
                Err(Error::PeerClosed { code, reason })
            }
            Err(e) => Err(self.abort(e)),
        }
    }

    pub fn emit(&mut self, out: &mut [u8]) -> Result<Progress> {
        // A short packet or a close ends the datagram; end this batch only
        if self.datagram_ended {
            self.datagram_ended = false;
            return Ok(Progress::NoProgress);
        }
        if self.is_closed() {
            return Err(Error::InvalidState("Connection is closed".to_string()));
        }

        let result = if matches!(self.close_state, CloseState::Closing(_)) {
            self.send_close(out)
        } else {
            self.send_pending(out)
        };

        match result {
            Ok(progress) => Ok(progress),
            Err(e @ Error::BufferTooShort { .. }) => Err(e),
            Err(e) => Err(self.abort(e)),
        }
    }

    /// Moves to the closed state after a local fatal error.
    fn abort(&mut self, error: Error) -> Error {
        self.trace(format_args!(
            "aborted with wire code {:#x}: {}",
            error.to_wire(),
            error
        ));
        log::warn!("{} connection {} failed: {}", self.role, hex::encode(&self.scid), error);
        self.close_state = CloseState::Closed;
        error
    }

    fn trace(&self, args: fmt::Arguments<'_>) {
        log::trace!("{} {} {}", self.role, hex::encode(&self.scid), args);
        if let Some(sink) = &self.debug_sink {
            sink.log_line(&format!("{} {} {}", self.role, hex::encode(&self.scid), args));
        }
    }

    fn install_initial_keys(&mut self, client_dcid: &[u8]) -> Result<()> {
        let secrets = hkdf::initial_secrets(client_dcid)?;
        self.install_keys(EncryptionLevel::Initial, CipherSuite::TlsAes128GcmSha256, &secrets)
    }

    fn install_keys(
        &mut self,
        level: EncryptionLevel,
        cipher_suite: CipherSuite,
        secrets: &TrafficSecrets,
    ) -> Result<()> {
        let (local, remote) = match self.role {
            Role::Initiator => (&secrets.client, &secrets.server),
            Role::Responder => (&secrets.server, &secrets.client),
        };

        self.spaces[level.index()].keys = Some(DirectionalKeys {
            seal: PacketKey::new(cipher_suite, local)?,
            open: PacketKey::new(cipher_suite, remote)?,
        });
        self.trace(format_args!("installed {} keys ({:?})", level, cipher_suite));
        Ok(())
    }

    fn apply_actions(&mut self, actions: Vec<HandshakeAction>) -> Result<()> {
        for action in actions {
            match action {
                HandshakeAction::Send { level, data } => {
                    self.spaces[level.index()].crypto_send.extend_from_slice(&data);
                }
                HandshakeAction::InstallKeys {
                    level,
                    cipher_suite,
                    secrets,
                } => self.install_keys(level, cipher_suite, &secrets)?,
                HandshakeAction::Complete => {
                    self.established = true;
                    if self.role.is_server() {
                        self.handshake_done_pending = true;
                    }
                    self.trace(format_args!(
                        "handshake completed, alpn {}",
                        self.application_proto()
                            .map(|p| String::from_utf8_lossy(p).into_owned())
                            .unwrap_or_else(|| "none".to_string())
                    ));
                }
            }
        }
        Ok(())
    }

    /// Decides whether a packet addressed to `dcid` is ours. Returns false
    /// for packets that are dropped without error.
    fn accept_destination(&mut self, packet: &SealedPacket<'_>, datagram_len: usize) -> Result<bool> {
        let dcid = &packet.header.dcid;

        if self.role == Role::Initiator {
            return Ok(*dcid == self.scid);
        }

        if let Some(original) = &self.original_dcid {
            return Ok(*dcid == self.scid || dcid == original);
        }
        if packet.header.packet_type != PacketType::Initial {
            return Ok(false);
        }

        if datagram_len < MIN_INITIAL_DATAGRAM {
            self.trace(format_args!(
                "dropping undersized client Initial datagram of {} bytes",
                datagram_len
            ));
            return Ok(false);
        }
        if dcid.len() < ORIGINAL_DCID_LEN {
            return Err(Error::InvalidConnectionId(format!(
                "Client chose a {} byte destination id",
                dcid.len()
            )));
        }

        self.original_dcid = Some(dcid.clone());
        self.install_initial_keys(dcid)?;
        self.handshake.set_original_destination_connection_id(dcid);
        Ok(true)
    }

    fn process_packet(&mut self, data: &[u8]) -> Result<usize> {
        let packet = SealedPacket::parse(data, self.scid.len())?;
        let level = packet.header.packet_type.level()?;
        let len = packet.len;

        if !self.accept_destination(&packet, data.len())? {
            self.trace(format_args!(
                "dropped {} packet for dcid {}",
                level,
                hex::encode(&packet.header.dcid)
            ));
            return Ok(len);
        }

        let space = &mut self.spaces[level.index()];
        let Some(keys) = &space.keys else {
            self.trace(format_args!("dropped {} packet, no keys yet", level));
            return Ok(len);
        };
        if space
            .largest_received
            .map_or(false, |largest| packet.packet_number <= largest)
        {
            self.trace(format_args!(
                "dropped duplicate {} packet {}",
                level, packet.packet_number
            ));
            return Ok(len);
        }

        let payload = packet.open(&keys.open)?;
        space.largest_received = Some(packet.packet_number);

        if self.peer_cid.is_none() && level == EncryptionLevel::Initial {
            self.peer_cid = Some(packet.header.scid.clone());
            self.dcid = packet.header.scid.clone();
        }

        self.stats.recv += 1;
        self.stats.recv_bytes += len as u64;
        self.trace(format_args!(
            "rx {} pn={} len={}",
            level, packet.packet_number, len
        ));

        for frame in Frame::parse_all(&payload)? {
            self.process_frame(level, frame)?;
        }

        self.process_crypto(level)?;

        Ok(len)
    }

    fn process_frame(&mut self, level: EncryptionLevel, frame: Frame) -> Result<()> {
        match frame {
            Frame::Padding { .. } | Frame::Ping => Ok(()),
            Frame::Crypto { offset, data } => {
                self.spaces[level.index()].crypto_recv.push(offset, &data)
            }
            Frame::ConnectionClose {
                error_code, reason, ..
            }
            | Frame::ApplicationClose { error_code, reason } => Err(Error::PeerClosed {
                code: error_code,
                reason: String::from_utf8_lossy(&reason).into_owned(),
            }),
            Frame::HandshakeDone => {
                if self.role.is_server() || level != EncryptionLevel::OneRtt {
                    return Err(Error::ProtocolError(format!(
                        "HANDSHAKE_DONE received by {} at {} level",
                        self.role, level
                    )));
                }
                self.trace(format_args!("handshake confirmed"));
                Ok(())
            }
        }
    }

    fn process_crypto(&mut self, level: EncryptionLevel) -> Result<()> {
        while let Some((message, raw)) = self.spaces[level.index()].crypto_recv.next_message()? {
            let actions = self.handshake.process_message(level, message, &raw)?;
            self.check_peer_params()?;
            self.apply_actions(actions)?;
        }
        Ok(())
    }

    /// Checks the connection ids the peer authenticated through its
    /// transport parameters against the ones seen on the wire.
    fn check_peer_params(&mut self) -> Result<()> {
        if self.peer_params_checked {
            return Ok(());
        }
        let Some(params) = self.handshake.peer_transport_params() else {
            return Ok(());
        };

        if params.initial_source_connection_id.as_deref() != self.peer_cid.as_deref() {
            return Err(Error::InvalidTransportParam(
                "initial_source_connection_id does not match the peer's packets".to_string(),
            ));
        }

        if self.role == Role::Initiator
            && params.original_destination_connection_id.as_deref() != self.original_dcid.as_deref()
        {
            return Err(Error::InvalidTransportParam(
                "original_destination_connection_id does not match our first Initial".to_string(),
            ));
        }

        self.peer_max_udp_payload_size =
            usize::try_from(params.max_udp_payload_size).unwrap_or(usize::MAX);
        self.peer_params_checked = true;
        Ok(())
    }

    fn max_datagram_len(&self, out: &[u8]) -> usize {
        out.len()
            .min(self.max_send_udp_payload_size)
            .min(self.peer_max_udp_payload_size)
    }

    /// Level whose crypto stream or control frames are waiting, by priority.
    fn pending_level(&self) -> Option<EncryptionLevel> {
        EncryptionLevel::ALL.into_iter().find(|level| {
            let space = &self.spaces[level.index()];
            space.keys.is_some()
                && (!space.crypto_send.is_empty()
                    || (*level == EncryptionLevel::OneRtt && self.handshake_done_pending))
        })
    }

    fn close_level(&self) -> Option<EncryptionLevel> {
        if self.established && self.spaces[EncryptionLevel::OneRtt.index()].keys.is_some() {
            return Some(EncryptionLevel::OneRtt);
        }
        [EncryptionLevel::Handshake, EncryptionLevel::Initial]
            .into_iter()
            .find(|level| self.spaces[level.index()].keys.is_some())
    }

    fn send_pending(&mut self, out: &mut [u8]) -> Result<Progress> {
        let Some(level) = self.pending_level() else {
            return Ok(Progress::NoProgress);
        };

        let packet_type = PacketType::for_level(level);
        let pad_initial = self.role == Role::Initiator && level == EncryptionLevel::Initial;
        if pad_initial && out.len() < MIN_INITIAL_DATAGRAM {
            return Err(Error::BufferTooShort {
                needed: MIN_INITIAL_DATAGRAM,
            });
        }

        let max_len = self.max_datagram_len(out);
        let tag_len = self.space_keys(level)?.seal.tag_len();
        let available = packet::max_payload_len(packet_type, &self.dcid, &self.scid, tag_len, max_len);

        let mut frames = Vec::new();
        let mut used = 0;

        if level == EncryptionLevel::OneRtt && self.handshake_done_pending && available > 0 {
            frames.push(Frame::HandshakeDone);
            used += 1;
            self.handshake_done_pending = false;
        }

        let space = &mut self.spaces[level.index()];
        if !space.crypto_send.is_empty() {
            let room = frame::max_crypto_data(space.crypto_send_offset, available - used);
            let chunk = room.min(space.crypto_send.len());
            if chunk == 0 {
                return Err(Error::BufferTooShort {
                    needed: packet::header_len(packet_type, &self.dcid, &self.scid) + tag_len + 8,
                });
            }

            let data = space.crypto_send.split_to(chunk).freeze();
            let crypto = Frame::Crypto {
                offset: space.crypto_send_offset,
                data,
            };
            space.crypto_send_offset += chunk as u64;
            used += crypto.encoded_len();
            frames.push(crypto);
        }

        if frames.is_empty() {
            return Err(Error::BufferTooShort {
                needed: packet::header_len(packet_type, &self.dcid, &self.scid) + tag_len + 1,
            });
        }

        if pad_initial {
            let target = packet::max_payload_len(
                packet_type,
                &self.dcid,
                &self.scid,
                tag_len,
                MIN_INITIAL_DATAGRAM,
            );
            if target > used {
                frames.push(Frame::Padding { len: target - used });
            }
        }

        self.write_frames(level, &frames, out)
    }

    fn send_close(&mut self, out: &mut [u8]) -> Result<Progress> {
        let level = self
            .close_level()
            .ok_or_else(|| Error::InvalidState("No keys to send CONNECTION_CLOSE".to_string()))?;
        let frame = match std::mem::replace(&mut self.close_state, CloseState::Closed) {
            CloseState::Closing(frame) => frame,
            _ => return Ok(Progress::NoProgress),
        };

        let mut frames = vec![frame];
        if self.role == Role::Initiator && level == EncryptionLevel::Initial {
            if out.len() < MIN_INITIAL_DATAGRAM {
                self.close_state = CloseState::Closing(frames.remove(0));
                return Err(Error::BufferTooShort {
                    needed: MIN_INITIAL_DATAGRAM,
                });
            }
            let tag_len = self.space_keys(level)?.seal.tag_len();
            let target = packet::max_payload_len(
                PacketType::Initial,
                &self.dcid,
                &self.scid,
                tag_len,
                MIN_INITIAL_DATAGRAM,
            );
            let used = frames[0].encoded_len();
            if target > used {
                frames.push(Frame::Padding { len: target - used });
            }
        }

        let progress = self.write_frames(level, &frames, out)?;
        self.datagram_ended = true;
        Ok(progress)
    }

    fn space_keys(&self, level: EncryptionLevel) -> Result<&DirectionalKeys> {
        self.spaces[level.index()]
            .keys
            .as_ref()
            .ok_or_else(|| Error::InvalidState(format!("No {} keys", level)))
    }

    fn write_frames(&mut self, level: EncryptionLevel, frames: &[Frame], out: &mut [u8]) -> Result<Progress> {
        let mut payload = Vec::new();
        for frame in frames {
            frame.encode(&mut payload)?;
        }

        let packet_type = PacketType::for_level(level);
        let packet_number = self.spaces[level.index()].next_packet_number;

        let mut packet_bytes = Vec::with_capacity(self.max_datagram_len(out));
        packet::write_packet(
            &mut packet_bytes,
            packet_type,
            &self.dcid,
            &self.scid,
            packet_number,
            &payload,
            &self.space_keys(level)?.seal,
        )?;

        if packet_bytes.len() > out.len() {
            return Err(Error::BufferTooShort {
                needed: packet_bytes.len(),
            });
        }
        out[..packet_bytes.len()].copy_from_slice(&packet_bytes);

        self.spaces[level.index()].next_packet_number += 1;
        if packet_type == PacketType::Short {
            self.datagram_ended = true;
        }

        self.stats.sent += 1;
        self.stats.sent_bytes += packet_bytes.len() as u64;
        self.trace(format_args!(
            "tx {} pn={} len={} frames={}",
            level,
            packet_number,
            packet_bytes.len(),
            frames.len()
        ));

        Ok(Progress::Progressed(packet_bytes.len()))
    }
}

impl Endpoint for Connection {
    fn ingest(&mut self, data: &[u8]) -> Result<Progress> {
        Connection::ingest(self, data)
    }

    fn emit(&mut self, out: &mut [u8]) -> Result<Progress> {
        Connection::emit(self, out)
    }

    fn is_established(&self) -> bool {
        Connection::is_established(self)
    }

    fn role(&self) -> Role {
        Connection::role(self)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("role", &self.role)
            .field("scid", &hex::encode(&self.scid))
            .field("dcid", &hex::encode(&self.dcid))
            .field("state", &self.handshake.get_state())
            .field("established", &self.established)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PROTOCOL_VERSION;

    fn client_config() -> Config {
        Config::builder(PROTOCOL_VERSION)
            .set_application_protos(b"\x06proto1")
            .build()
            .unwrap()
    }

    fn server_config() -> Config {
        Config::builder(PROTOCOL_VERSION)
            .load_cert_chain_from_pem_file("tests/data/cert.crt")
            .load_priv_key_from_pem_file("tests/data/cert.key")
            .set_application_protos(b"\x06proto1")
            .build()
            .unwrap()
    }

    #[test]
    fn test_connection_id_bounds() {
        let config = client_config();
        assert!(matches!(
            Connection::connect(None, &[], &config),
            Err(Error::InvalidConnectionId(_))
        ));
        assert!(matches!(
            Connection::connect(None, &[0; 21], &config),
            Err(Error::InvalidConnectionId(_))
        ));
        assert!(Connection::connect(None, &[0; 20], &config).is_ok());
    }

    #[test]
    fn test_accept_requires_credentials() {
        let config = client_config();
        assert!(matches!(
            Connection::accept(&[2, 0, 0, 0], None, &config),
            Err(Error::CertificateError(_))
        ));
    }

    #[test]
    fn test_first_flight_is_padded() {
        let config = client_config();
        let mut client = Connection::connect(Some("quic.tech"), &[1, 0, 0, 0], &config).unwrap();

        let mut buf = [0u8; 2000];
        assert_eq!(client.emit(&mut buf).unwrap(), Progress::Progressed(1200));
        assert_eq!(buf[0] & 0xF0, 0xC0);
        assert_eq!(client.emit(&mut buf).unwrap(), Progress::NoProgress);
        assert_eq!(client.stats().sent, 1);
    }

    #[test]
    fn test_first_flight_needs_room() {
        let config = client_config();
        let mut client = Connection::connect(None, &[1, 0, 0, 0], &config).unwrap();

        let mut buf = [0u8; 600];
        assert!(matches!(
            client.emit(&mut buf),
            Err(Error::BufferTooShort { needed: 1200 })
        ));
        // Still pending afterwards
        let mut buf = [0u8; 1500];
        assert_eq!(client.emit(&mut buf).unwrap(), Progress::Progressed(1200));
    }

    #[test]
    fn test_server_is_idle_before_input() {
        let config = server_config();
        let mut server = Connection::accept(&[2, 0, 0, 0], None, &config).unwrap();

        let mut buf = [0u8; 1500];
        assert_eq!(server.emit(&mut buf).unwrap(), Progress::NoProgress);
        assert_eq!(server.ingest(&[]).unwrap(), Progress::NoProgress);
        assert!(!server.is_established());
    }

    #[test]
    fn test_garbage_is_fatal() {
        let config = server_config();
        let mut server = Connection::accept(&[2, 0, 0, 0], None, &config).unwrap();

        assert!(server.ingest(&[0xC3, 0, 0, 0, 7, 0, 0]).is_err());
        assert!(server.is_closed());
        let mut buf = [0u8; 1500];
        assert!(matches!(server.emit(&mut buf), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_close_before_keys() {
        let config = server_config();
        let mut server = Connection::accept(&[2, 0, 0, 0], None, &config).unwrap();

        server.close(false, 0, b"").unwrap();
        assert!(server.is_closed());
        assert!(matches!(server.close(false, 0, b""), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_client_close_is_sent_then_closed() {
        let config = client_config();
        let mut client = Connection::connect(None, &[1, 0, 0, 0], &config).unwrap();

        client.close(true, 42, b"bye").unwrap();
        assert!(!client.is_closed());

        let mut buf = [0u8; 1500];
        assert_eq!(client.emit(&mut buf).unwrap(), Progress::Progressed(1200));
        assert!(client.is_closed());
        assert_eq!(client.emit(&mut buf).unwrap(), Progress::NoProgress);
        assert!(client.emit(&mut buf).is_err());
    }
}
