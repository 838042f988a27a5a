use crate::error::Result;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Initiator,
    Responder,
}

impl Role {
    pub fn is_server(&self) -> bool {
        *self == Role::Responder
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Initiator => write!(f, "client"),
            Role::Responder => write!(f, "server"),
        }
    }
}

/// Outcome of a successful `ingest` or `emit` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// This many bytes were consumed or produced.
    Progressed(usize),
    /// Nothing to do right now. Not an error.
    NoProgress,
}

impl Progress {
    pub fn bytes(&self) -> usize {
        match self {
            Progress::Progressed(n) => *n,
            Progress::NoProgress => 0,
        }
    }
}

/// The surface the loopback pump drives.
pub trait Endpoint {
    /// Processes datagram bytes from the front of `data`.
    fn ingest(&mut self, data: &[u8]) -> Result<Progress>;

    /// Writes at most one outbound datagram into `out`.
    fn emit(&mut self, out: &mut [u8]) -> Result<Progress>;

    fn is_established(&self) -> bool;

    fn role(&self) -> Role;
}
