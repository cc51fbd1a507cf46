//! Viralscan - Viral Story Discovery
//!
//! Fetches recent posts from a set of sources concurrently, ranks them by an
//! engagement-per-hour score and caches the ranked results so repeated
//! searches are answered without touching the network.

pub mod cli;
pub mod config;
pub mod error;
pub mod search;
pub mod session;
pub mod sources;

pub use error::{Result, ViralscanError};
