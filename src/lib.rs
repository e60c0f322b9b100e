//! feedmill — a feed ingestion and synchronization service.
//!
//! The engine turns remote RSS 2.0 / Atom documents into a deduplicated,
//! append-only store of articles shared across users, while per-user
//! subscription and read/star state stays in separate overlay tables.
//!
//! The pipeline for one feed is fetch → parse → reconcile:
//!
//! - [`feed::Fetcher`] retrieves a document under a hard timeout and size
//!   ceiling, refusing loopback and private-network targets.
//! - [`feed::parse_feed`] normalizes RSS or Atom XML into a canonical
//!   [`feed::ParsedFeed`].
//! - [`storage::Database::reconcile`] commits the result in one transaction,
//!   inserting articles keyed by `(feed_id, guid)` and never overwriting.
//!
//! [`engine::Engine`] ties the pieces together behind a single entry point
//! gated by a per-identity [`ratelimit::RateLimiter`], and drives the
//! periodic staleness sweep. [`server`] exposes the engine over HTTP.

pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod ratelimit;
pub mod server;
pub mod storage;
pub mod util;
