use crate::alert::AlertDescription;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Crypto error: {0}")]
    CryptoError(String),

    #[error("Certificate error: {0}")]
    CertificateError(String),

    #[error("Buffer too short: {needed} bytes required")]
    BufferTooShort { needed: usize },

    #[error("Unknown protocol version: {0:#010x}")]
    UnknownVersion(u32),

    #[error("Invalid connection id: {0}")]
    InvalidConnectionId(String),

    #[error("Invalid transport parameter: {0}")]
    InvalidTransportParam(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Handshake failure ({alert:?}): {reason}")]
    HandshakeFailure {
        alert: AlertDescription,
        reason: String,
    },

    #[error("Peer closed the connection with code {code:#x}: {reason}")]
    PeerClosed { code: u64, reason: String },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn handshake(alert: AlertDescription, reason: impl Into<String>) -> Self {
        Error::HandshakeFailure {
            alert,
            reason: reason.into(),
        }
    }

    /// Wire code carried in the CONNECTION_CLOSE frame sent for this error.
    pub fn to_wire(&self) -> u64 {
        match self {
            Error::HandshakeFailure { alert, .. } => 0x0100 | *alert as u64,
            Error::CryptoError(_) | Error::CertificateError(_) => {
                0x0100 | AlertDescription::DecryptError as u64
            }
            Error::InvalidTransportParam(_) => 0x08,
            Error::ParseError(_) => 0x07,
            Error::ProtocolError(_) | Error::UnknownVersion(_) => 0x0a,
            _ => 0x01,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    CertificateChain,
    PrivateKey,
    TrustAnchors,
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialKind::CertificateChain => write!(f, "certificate chain"),
            CredentialKind::PrivateKey => write!(f, "private key"),
            CredentialKind::TrustAnchors => write!(f, "trust anchors"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unsupported protocol version: {0:#010x}")]
    UnsupportedVersion(u32),

    #[error("Failed to load {kind} from {}: {reason}", path.display())]
    CredentialLoadFailed {
        kind: CredentialKind,
        path: PathBuf,
        reason: String,
    },

    #[error("Invalid application protocol list: {0}")]
    InvalidProtocolList(String),
}

impl ConfigError {
    pub fn credential_kind(&self) -> Option<CredentialKind> {
        match self {
            ConfigError::CredentialLoadFailed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
