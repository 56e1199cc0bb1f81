//! User-facing run log and progress reporting.
//!
//! The host application supplies a [`LogSink`] that receives every
//! human-readable line of a run, and optionally a [`ProgressSink`] for short
//! status updates. The core never writes to stdout itself; diagnostics that
//! are not meant for the operator go through `tracing` instead.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Verbosity of the run log.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum LogLevel {
    #[default]
    Normal,
    Debug,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "Normal"),
            Self::Debug => write!(f, "Debug"),
        }
    }
}

/// Destination for human-readable run output.
pub trait LogSink: Send + Sync {
    fn write(&self, line: &str);
}

/// Destination for short status strings (e.g. a status bar or spinner).
pub trait ProgressSink: Send + Sync {
    fn report(&self, message: &str);
}

/// Progress sink that discards everything.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _message: &str) {}
}

/// In-memory sink, handy for hosts that render the log themselves and for tests.
#[derive(Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn write(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

impl ProgressSink for MemorySink {
    fn report(&self, message: &str) {
        self.write(message);
    }
}

/// Leveled wrapper around a [`LogSink`].
#[derive(Clone)]
pub struct RunLogger {
    sink: Arc<dyn LogSink>,
    level: LogLevel,
}

impl RunLogger {
    pub fn new(sink: Arc<dyn LogSink>, level: LogLevel) -> Self {
        Self { sink, level }
    }

    pub fn debug_enabled(&self) -> bool {
        self.level == LogLevel::Debug
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.sink.write(message.as_ref());
    }

    /// Suppressed unless the level is [`LogLevel::Debug`].
    pub fn debug(&self, message: impl AsRef<str>) {
        if self.debug_enabled() {
            self.sink.write(&format!("[DEBUG] {}", message.as_ref()));
        }
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.sink.write(&format!("[ERROR] {}", message.as_ref()));
    }

    pub fn fatal(&self, message: impl AsRef<str>) {
        self.sink.write(&format!("--- [FATAL] {} ---", message.as_ref()));
    }
}

/// Wraps a [`ProgressSink`] so a misbehaving sink can't disturb the run.
#[derive(Clone)]
pub struct Progress {
    sink: Arc<dyn ProgressSink>,
}

impl Progress {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self { sink }
    }

    pub fn none() -> Self {
        Self::new(Arc::new(NoProgress))
    }

    pub fn report(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        let sink = &self.sink;
        if catch_unwind(AssertUnwindSafe(|| sink.report(message))).is_err() {
            warn!(progress = message, "progress sink panicked; ignoring");
        }
    }
}
