//! Target localization platform (Transifex-style JSON:API) access.

pub mod client;
pub mod payload;

pub use client::{PollResponse, RemoteJobStatus, TargetClient};
