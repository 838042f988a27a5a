use crate::error::{Error, Result};
use crate::utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Warning = 1,
    Fatal = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDescription {
    CloseNotify = 0,
    UnexpectedMessage = 10,
    BadRecordMac = 20,
    HandshakeFailure = 40,
    BadCertificate = 42,
    UnsupportedCertificate = 43,
    CertificateExpired = 45,
    CertificateUnknown = 46,
    IllegalParameter = 47,
    UnknownCa = 48,
    DecodeError = 50,
    DecryptError = 51,
    ProtocolVersion = 70,
    InternalError = 80,
    MissingExtension = 109,
    UnsupportedExtension = 110,
    UnrecognizedName = 112,
    NoApplicationProtocol = 120,
}

impl TryFrom<u8> for AlertDescription {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(AlertDescription::CloseNotify),
            10 => Ok(AlertDescription::UnexpectedMessage),
            20 => Ok(AlertDescription::BadRecordMac),
            40 => Ok(AlertDescription::HandshakeFailure),
            42 => Ok(AlertDescription::BadCertificate),
            43 => Ok(AlertDescription::UnsupportedCertificate),
            45 => Ok(AlertDescription::CertificateExpired),
            46 => Ok(AlertDescription::CertificateUnknown),
            47 => Ok(AlertDescription::IllegalParameter),
            48 => Ok(AlertDescription::UnknownCa),
            50 => Ok(AlertDescription::DecodeError),
            51 => Ok(AlertDescription::DecryptError),
            70 => Ok(AlertDescription::ProtocolVersion),
            80 => Ok(AlertDescription::InternalError),
            109 => Ok(AlertDescription::MissingExtension),
            110 => Ok(AlertDescription::UnsupportedExtension),
            112 => Ok(AlertDescription::UnrecognizedName),
            120 => Ok(AlertDescription::NoApplicationProtocol),
            _ => Err(Error::ParseError(format!("Invalid alert description: {}", value))),
        }
    }
}

/// A TLS alert. QUIC never sends alerts as records; the description is
/// folded into a CONNECTION_CLOSE error code as `0x0100 + description`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub description: AlertDescription,
}

impl Alert {
    pub fn fatal(description: AlertDescription) -> Self {
        Self {
            level: AlertLevel::Fatal,
            description,
        }
    }

    pub fn parse(data: &[u8], pos: &mut usize) -> Result<Self> {
        let level = match utils::read_u8(data, pos)? {
            1 => AlertLevel::Warning,
            2 => AlertLevel::Fatal,
            other => return Err(Error::ParseError(format!("Invalid alert level: {}", other))),
        };
        let description = AlertDescription::try_from(utils::read_u8(data, pos)?)?;

        Ok(Self { level, description })
    }

    pub fn serialize(&self) -> Vec<u8> {
        vec![self.level as u8, self.description as u8]
    }

    pub fn is_fatal(&self) -> bool {
        self.level == AlertLevel::Fatal
    }

    /// Recovers the alert carried by a QUIC crypto error code, if any.
    pub fn from_crypto_error_code(code: u64) -> Option<Self> {
        if !(0x0100..=0x01ff).contains(&code) {
            return None;
        }
        AlertDescription::try_from((code - 0x0100) as u8)
            .ok()
            .map(Alert::fatal)
    }
}
