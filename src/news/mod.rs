//! Channel news pipeline: webhook ingestion and the translated feed.

pub mod feed;
pub mod ingest;

pub use feed::{clamp_limit, load_feed, FeedItem, FeedMedia, FeedQuery, FeedResponse};
pub use ingest::{ingest_update, IngestOutcome, SkipReason};
