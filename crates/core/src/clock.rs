//! Time source used for pacing, backoff and deadlines.
//!
//! Production code uses [`TokioClock`]. [`VirtualClock`] advances instantly
//! and records every requested sleep, so polling behaviour can be asserted
//! without waiting minutes of wall time.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Real time, via `tokio::time`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug)]
struct VirtualState {
    elapsed: Duration,
    sleeps: Vec<Duration>,
}

/// Clock whose time only moves when something sleeps on it.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    origin: Instant,
    state: Arc<Mutex<VirtualState>>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            state: Arc::new(Mutex::new(VirtualState {
                elapsed: Duration::ZERO,
                sleeps: Vec::new(),
            })),
        }
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.lock().map(|s| s.sleeps.clone()).unwrap_or_default()
    }

    /// Sleeps of at least `min`, i.e. excluding short pacing delays.
    pub fn sleeps_at_least(&self, min: Duration) -> Vec<Duration> {
        self.sleeps().into_iter().filter(|d| *d >= min).collect()
    }

    pub fn elapsed(&self) -> Duration {
        self.state.lock().map(|s| s.elapsed).unwrap_or_default()
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for VirtualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.elapsed += duration;
            state.sleeps.push(duration);
        }
    }
}
