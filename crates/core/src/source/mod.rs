//! Source CMS (Braze-style REST API) access.

pub mod client;

pub use client::{Listing, SourceClient};
