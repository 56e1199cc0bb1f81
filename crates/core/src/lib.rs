//! locsync core library.
//!
//! This crate provides the components that move translatable content from a
//! Source CMS into a Target localization platform: configuration, the Source
//! and Target REST clients, the TMX backup job, cooperative cancellation, the
//! run log, and the sync orchestrator that ties them together.

pub mod backup;
pub mod cancel;
pub mod clock;
pub mod config;
pub mod errors;
mod http;
pub mod logging;
pub mod models;
pub mod source;
pub mod sync_engine;
pub mod target;

// Re-exports for convenience.
pub use backup::{BackupJob, PollPolicy};
pub use cancel::CancellationToken;
pub use config::AppConfig;
pub use logging::{LogLevel, LogSink, ProgressSink, RunLogger};
pub use source::SourceClient;
pub use sync_engine::{RunContext, SyncOrchestrator};
pub use target::TargetClient;
