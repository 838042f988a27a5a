//! Drives two endpoints through their handshake over one shared buffer.
//!
//! Each round hands the bytes the previous endpoint produced to the other
//! one, lets it consume as much as it will, and then refills the buffer from
//! offset zero with everything it wants to send.

use crate::endpoint::{Endpoint, Progress, Role};
use crate::error::Error;
use thiserror::Error;

/// Size of the transfer buffer the harness uses.
pub const TRANSFER_BUFFER_SIZE: usize = 65535;

pub const DEFAULT_MAX_ROUNDS: usize = 16;

#[derive(Debug, Error)]
pub enum PumpError {
    #[error("initiator failed to produce its first flight: {0}")]
    InitialSend(#[source] Error),

    #[error("initiator produced an empty first flight")]
    EmptyInitialFlight,

    #[error("{role} round failed: {source}")]
    Round {
        role: Role,
        #[source]
        source: Error,
    },

    #[error("handshake not established after {0} rounds")]
    RoundLimitExceeded(usize),
}

impl PumpError {
    /// The endpoint error behind this failure, if any.
    pub fn endpoint_error(&self) -> Option<&Error> {
        match self {
            PumpError::InitialSend(e) | PumpError::Round { source: e, .. } => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundReport {
    /// Zero for the initiator's first flight.
    pub round: usize,
    /// The endpoint that ran.
    pub role: Role,
    pub consumed: usize,
    pub produced: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandshakeSummary {
    pub rounds: usize,
    pub initiator_bytes: usize,
    pub responder_bytes: usize,
}

/// Feeds `buffer[..incoming_len]` to `receiver`, then refills `buffer` with
/// its output. Returns the number of bytes now in `buffer`.
pub fn pump_round<E: Endpoint + ?Sized>(
    receiver: &mut E,
    buffer: &mut [u8],
    incoming_len: usize,
) -> Result<usize, Error> {
    exchange(receiver, buffer, incoming_len).map(|(_, produced)| produced)
}

/// One round, returning `(consumed, produced)`.
fn exchange<E: Endpoint + ?Sized>(
    receiver: &mut E,
    buffer: &mut [u8],
    incoming_len: usize,
) -> Result<(usize, usize), Error> {
    let consumed = ingest_all(receiver, &buffer[..incoming_len])?;
    let produced = emit_all(receiver, buffer)?;
    Ok((consumed, produced))
}

fn ingest_all<E: Endpoint + ?Sized>(receiver: &mut E, incoming: &[u8]) -> Result<usize, Error> {
    let mut offset = 0;
    while offset < incoming.len() {
        match receiver.ingest(&incoming[offset..])? {
            Progress::Progressed(n) => offset += n,
            Progress::NoProgress => break,
        }
    }

    if offset < incoming.len() {
        log::debug!(
            "{} left {} of {} incoming bytes unconsumed",
            receiver.role(),
            incoming.len() - offset,
            incoming.len()
        );
    }
    Ok(offset)
}

fn emit_all<E: Endpoint + ?Sized>(sender: &mut E, buffer: &mut [u8]) -> Result<usize, Error> {
    let mut offset = 0;
    while offset < buffer.len() {
        match sender.emit(&mut buffer[offset..])? {
            Progress::Progressed(n) => offset += n,
            Progress::NoProgress => break,
        }
    }
    Ok(offset)
}

/// Runs the handshake with default options.
pub fn drive_handshake<I, R>(
    initiator: &mut I,
    responder: &mut R,
    buffer: &mut [u8],
) -> Result<HandshakeSummary, PumpError>
where
    I: Endpoint + ?Sized,
    R: Endpoint + ?Sized,
{
    HandshakePump::new().run(initiator, responder, buffer)
}

type Observer<'a> = Box<dyn FnMut(&RoundReport) + 'a>;

/// The pump loop with a round ceiling and an optional per-round observer.
pub struct HandshakePump<'a> {
    max_rounds: usize,
    observer: Option<Observer<'a>>,
}

impl Default for HandshakePump<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> HandshakePump<'a> {
    pub fn new() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            observer: None,
        }
    }

    /// Caps the responder/initiator round pairs run inside the loop.
    pub fn max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn observe<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&RoundReport) + 'a,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    fn report(&mut self, report: RoundReport, summary: &mut HandshakeSummary) {
        match report.role {
            Role::Initiator => summary.initiator_bytes += report.produced,
            Role::Responder => summary.responder_bytes += report.produced,
        }
        log::debug!(
            "round {}: {} consumed {} produced {}",
            report.round,
            report.role,
            report.consumed,
            report.produced
        );
        if let Some(observer) = self.observer.as_mut() {
            observer(&report);
        }
    }

    fn round<E: Endpoint + ?Sized>(
        &mut self,
        endpoint: &mut E,
        buffer: &mut [u8],
        incoming_len: usize,
        round: usize,
        summary: &mut HandshakeSummary,
    ) -> Result<usize, PumpError> {
        let role = endpoint.role();
        let (consumed, produced) = exchange(endpoint, buffer, incoming_len)
            .map_err(|source| PumpError::Round { role, source })?;
        self.report(
            RoundReport {
                round,
                role,
                consumed,
                produced,
            },
            summary,
        );
        Ok(produced)
    }

    pub fn run<I, R>(
        &mut self,
        initiator: &mut I,
        responder: &mut R,
        buffer: &mut [u8],
    ) -> Result<HandshakeSummary, PumpError>
    where
        I: Endpoint + ?Sized,
        R: Endpoint + ?Sized,
    {
        let mut summary = HandshakeSummary::default();

        let mut len = match initiator.emit(buffer).map_err(PumpError::InitialSend)? {
            Progress::Progressed(0) | Progress::NoProgress => {
                return Err(PumpError::EmptyInitialFlight)
            }
            Progress::Progressed(n) => n,
        };
        self.report(
            RoundReport {
                round: 0,
                role: initiator.role(),
                consumed: 0,
                produced: len,
            },
            &mut summary,
        );

        // Stops as soon as either side is established
        while !initiator.is_established() && !responder.is_established() {
            if summary.rounds >= self.max_rounds {
                return Err(PumpError::RoundLimitExceeded(summary.rounds));
            }
            summary.rounds += 1;

            len = self.round(responder, buffer, len, summary.rounds, &mut summary)?;
            len = self.round(initiator, buffer, len, summary.rounds, &mut summary)?;
        }

        // Lets the responder see the initiator's final flight
        self.round(responder, buffer, len, summary.rounds + 1, &mut summary)?;

        Ok(summary)
    }
}
