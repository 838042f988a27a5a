use crate::crypto::TrafficSecrets;
use crate::endpoint::Role;
use crate::error::{Error, Result};
use crate::handshake::{CipherSuite, Handshake};
use crate::packet::EncryptionLevel;
use crate::transport_params::TransportParams;

pub mod client;
pub mod server;

pub use client::{ClientParams, ClientState};
pub use server::{ServerParams, ServerState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Start,
    WaitClientHello,
    WaitServerHello,
    WaitEncryptedExtensions,
    WaitCertificate,
    WaitCertificateVerify,
    WaitFinished,
    Connected,
}

/// What the connection must do after the handshake consumed a message.
#[derive(Debug)]
pub enum HandshakeAction {
    /// Queue framed handshake bytes on the CRYPTO stream of `level`.
    Send { level: EncryptionLevel, data: Vec<u8> },
    /// Keys for `level` are available in both directions.
    InstallKeys {
        level: EncryptionLevel,
        cipher_suite: CipherSuite,
        secrets: TrafficSecrets,
    },
    Complete,
}

pub trait StateHandler: Send {
    /// Produces the first flight, if this side speaks first.
    fn start(&mut self) -> Result<Vec<HandshakeAction>> {
        Ok(Vec::new())
    }

    fn process_message(
        &mut self,
        level: EncryptionLevel,
        message: Handshake,
        raw: &[u8],
    ) -> Result<Vec<HandshakeAction>>;

    fn get_state(&self) -> ConnectionState;

    fn is_handshake_complete(&self) -> bool {
        self.get_state() == ConnectionState::Connected
    }

    fn get_selected_cipher_suite(&self) -> Option<CipherSuite>;
    fn application_protocol(&self) -> Option<&[u8]>;
    fn peer_transport_params(&self) -> Option<&TransportParams>;

    fn set_original_destination_connection_id(&mut self, _odcid: &[u8]) {}
}

pub struct HandshakeState {
    role: Role,
    handler: Box<dyn StateHandler>,
}

impl HandshakeState {
    pub fn new_client(params: ClientParams) -> Result<Self> {
        Ok(Self {
            role: Role::Initiator,
            handler: Box::new(ClientState::new(params)?),
        })
    }

    pub fn new_server(params: ServerParams) -> Self {
        Self {
            role: Role::Responder,
            handler: Box::new(ServerState::new(params)),
        }
    }

    pub fn start(&mut self) -> Result<Vec<HandshakeAction>> {
        self.handler.start()
    }

    pub fn process_message(
        &mut self,
        level: EncryptionLevel,
        message: Handshake,
        raw: &[u8],
    ) -> Result<Vec<HandshakeAction>> {
        log::trace!(
            "{} processing {:?} at {} in state {:?}",
            self.role,
            message.message_type(),
            level,
            self.handler.get_state()
        );
        self.handler.process_message(level, message, raw)
    }

    pub fn is_handshake_complete(&self) -> bool {
        self.handler.is_handshake_complete()
    }

    pub fn get_state(&self) -> ConnectionState {
        self.handler.get_state()
    }

    pub fn get_role(&self) -> Role {
        self.role
    }

    pub fn get_selected_cipher_suite(&self) -> Option<CipherSuite> {
        self.handler.get_selected_cipher_suite()
    }

    pub fn application_protocol(&self) -> Option<&[u8]> {
        self.handler.application_protocol()
    }

    pub fn peer_transport_params(&self) -> Option<&TransportParams> {
        self.handler.peer_transport_params()
    }

    pub fn set_original_destination_connection_id(&mut self, odcid: &[u8]) {
        self.handler.set_original_destination_connection_id(odcid)
    }
}

pub(crate) fn expect_level(
    expected: EncryptionLevel,
    level: EncryptionLevel,
    message: &Handshake,
) -> Result<()> {
    if expected != level {
        return Err(unexpected(message, level));
    }
    Ok(())
}

pub(crate) fn unexpected(message: &Handshake, level: EncryptionLevel) -> Error {
    Error::handshake(
        crate::alert::AlertDescription::UnexpectedMessage,
        format!("Unexpected {:?} at {} level", message.message_type(), level),
    )
}
