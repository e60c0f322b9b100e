//! Engine-level error taxonomy.
//!
//! Every failure a caller can observe collapses into one [`EngineError`]
//! variant, and each variant owns its HTTP status. Single-target operations
//! propagate the first error; the staleness sweep never surfaces these at
//! all — per-feed failures are folded into the sweep's result entries.

use thiserror::Error;

use crate::feed::{FetchError, ParseError};
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Disallowed URL, malformed request body, or any other caller mistake
    #[error("{0}")]
    Validation(String),

    /// Missing or empty caller identity
    #[error("missing caller identity")]
    Auth,

    /// The caller identity exhausted its request window
    #[error("rate limit exceeded")]
    RateLimited,

    /// Targeted refresh of a feed id that does not exist
    #[error("feed {0} not found")]
    FeedNotFound(i64),

    /// The remote origin failed us: network error, non-2xx, timeout, ceiling
    #[error("fetch failed: {0}")]
    Fetch(FetchError),

    /// The document is not a recognizable RSS/Atom feed
    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    /// Storage write or read failure; nothing was partially committed
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl EngineError {
    /// HTTP status for this failure class.
    pub fn status(&self) -> u16 {
        match self {
            EngineError::Validation(_) | EngineError::Parse(_) => 400,
            EngineError::Auth => 401,
            EngineError::FeedNotFound(_) => 404,
            EngineError::RateLimited => 429,
            EngineError::Fetch(_) => 502,
            EngineError::Storage(_) => 500,
        }
    }
}

impl From<FetchError> for EngineError {
    fn from(err: FetchError) -> Self {
        match err {
            // A guarded-out URL is the caller's mistake, not the origin's
            FetchError::Rejected(guard) => EngineError::Validation(guard.to_string()),
            other => EngineError::Fetch(other),
        }
    }
}
