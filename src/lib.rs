pub mod alert;
pub mod certificate;
pub mod config;
pub mod connection;
pub mod crypto;
pub mod diagnostics;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod packet;
pub mod pump;
pub mod state;
pub mod transport_params;
pub mod utils;

pub use config::{Config, ConfigBuilder, Credentials};
pub use connection::{Connection, Stats};
pub use diagnostics::{DebugSink, LogSink, StderrSink};
pub use endpoint::{Endpoint, Progress, Role};
pub use error::{ConfigError, CredentialKind, Error, Result};
pub use pump::{drive_handshake, pump_round, HandshakePump, HandshakeSummary, PumpError, RoundReport};
pub use transport_params::TransportParams;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The only wire version spoken.
pub const PROTOCOL_VERSION: u32 = 0x0000_0001;

pub const MAX_CONN_ID_LEN: usize = 20;

pub fn init_logging() {
    let _ = env_logger::builder().try_init();
}
