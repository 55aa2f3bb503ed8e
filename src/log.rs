//! Operator-facing progress reporting.
//!
//! The engine never prints directly; it reports through an [`AnchorLog`]
//! handed to it by the caller. [`TracingLog`] forwards to `tracing`, which the
//! binary wires to a coloured console (or JSON) subscriber.

use tracing::{error, info, warn};

/// Severity of a progress message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Critical,
}

/// Sink for progress messages emitted by a round and the scheduler.
pub trait AnchorLog: Send + Sync {
    fn emit(&self, severity: Severity, message: &str);

    fn info(&self, message: &str) {
        self.emit(Severity::Info, message);
    }

    fn success(&self, message: &str) {
        self.emit(Severity::Success, message);
    }

    fn warning(&self, message: &str) {
        self.emit(Severity::Warning, message);
    }

    fn critical(&self, message: &str) {
        self.emit(Severity::Critical, message);
    }
}

/// Production sink backed by `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl AnchorLog for TracingLog {
    fn emit(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => info!("{message}"),
            Severity::Success => info!(outcome = "ok", "{message}"),
            Severity::Warning => warn!("{message}"),
            Severity::Critical => error!("{message}"),
        }
    }
}
