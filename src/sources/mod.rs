//! Upstream source clients implementing [`crate::search::SourceClient`]

mod reddit;

pub use reddit::{reddit_period, RedditClient};
