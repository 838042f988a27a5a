//! Per-connection trace lines, routed to whatever sink the configuration
//! carries.

use std::io::Write;

pub trait DebugSink: Send + Sync {
    fn log_line(&self, line: &str);
}

impl<F> DebugSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log_line(&self, line: &str) {
        self(line)
    }
}

/// Forwards lines to the `log` facade at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DebugSink for LogSink {
    fn log_line(&self, line: &str) {
        log::debug!(target: "quic_loopback::trace", "{}", line);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl DebugSink for StderrSink {
    fn log_line(&self, line: &str) {
        let _ = writeln!(std::io::stderr().lock(), "{}", line);
    }
}
