//! Cooperative cancellation.
//!
//! A [`CancellationToken`] is tripped by an external actor (a Ctrl+C handler,
//! a "Stop" button) and only ever read by the core. The engine checks it at
//! loop-iteration boundaries; an in-flight HTTP call is never interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::errors::SyncError;

/// Shared cancellation flag. Cloning shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            info!("cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(SyncError::Cancelled)` once the token has been tripped.
    pub fn check(&self) -> Result<(), SyncError> {
        if self.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }
}
