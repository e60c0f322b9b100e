use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Storage-layer errors. Write failures surface as-is — the reconcile
/// transaction guarantees there is never a half-applied state to report.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

// ============================================================================
// Records
// ============================================================================

/// One syndication source, identified by its canonical (post-redirect) URL.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FeedRecord {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub site_url: Option<String>,
    pub favicon_url: Option<String>,
    pub last_fetched_at: Option<i64>,
    pub created_at: i64,
}

/// One stored article. `(feed_id, guid)` is the identity key; rows are
/// inserted once and never mutated or deleted by the engine.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ArticleRecord {
    pub id: i64,
    pub feed_id: i64,
    pub guid: String,
    pub title: String,
    pub url: String,
    pub author: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub published_at: Option<i64>,
    pub created_at: i64,
}

/// One user's subscription to a feed.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SubscriptionRecord {
    pub id: i64,
    pub user_id: String,
    pub feed_id: i64,
    pub folder_id: Option<i64>,
    pub custom_title: Option<String>,
    pub created_at: i64,
}

// ============================================================================
// Write Inputs
// ============================================================================

/// Mutable feed metadata, overwritten on every successful fetch.
#[derive(Debug, Clone)]
pub struct FeedMetadata {
    /// Canonical (post-redirect) URL; the upsert key.
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub site_url: Option<String>,
    pub favicon_url: Option<String>,
}

/// One article as produced by the parser, ready for insertion.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub guid: String,
    pub title: String,
    pub url: String,
    pub author: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub published_at: Option<i64>,
}

/// Result of one reconcile transaction.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// The feed row after the metadata upsert.
    pub feed: FeedRecord,
    /// Articles actually inserted this run. A repeated payload yields 0,
    /// which is the observable form of the idempotence guarantee.
    pub new_articles: usize,
}

/// Minimal row driving the staleness sweep.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StaleFeed {
    pub id: i64,
    pub url: String,
}
