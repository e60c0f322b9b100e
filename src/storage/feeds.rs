use chrono::Utc;

use super::articles::insert_articles;
use super::schema::Database;
use super::types::{FeedMetadata, FeedRecord, NewArticle, ReconcileOutcome, StaleFeed, StorageError};

const FEED_COLUMNS: &str =
    "id, url, title, description, site_url, favicon_url, last_fetched_at, created_at";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Get a feed by its database id
    pub async fn get_feed(&self, feed_id: i64) -> Result<Option<FeedRecord>, StorageError> {
        let feed = sqlx::query_as(&format!("SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?"))
            .bind(feed_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(feed)
    }

    /// Get a feed by its canonical URL
    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<FeedRecord>, StorageError> {
        let feed = sqlx::query_as(&format!("SELECT {FEED_COLUMNS} FROM feeds WHERE url = ?"))
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(feed)
    }

    /// Feeds that have never been fetched, or not since `cutoff`.
    pub async fn feeds_due_for_refresh(&self, cutoff: i64) -> Result<Vec<StaleFeed>, StorageError> {
        let feeds = sqlx::query_as(
            "SELECT id, url FROM feeds
             WHERE last_fetched_at IS NULL OR last_fetched_at < ?
             ORDER BY id",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    /// Commits one parsed feed in a single transaction.
    ///
    /// The feed row is upserted on its canonical URL — only mutable metadata
    /// (title, description, site_url, favicon_url, last_fetched_at) is
    /// overwritten for an existing row; `created_at` and the id are stable.
    /// Articles are insert-only: a `(feed_id, guid)` conflict leaves the
    /// stored row untouched, so retried and overlapping fetches are
    /// idempotent and can never disturb per-user state hanging off an
    /// article id.
    ///
    /// Any failure rolls back the whole unit; there is no state where the
    /// metadata committed but the article batch did not.
    pub async fn reconcile(
        &self,
        metadata: &FeedMetadata,
        items: &[NewArticle],
    ) -> Result<ReconcileOutcome, StorageError> {
        let now = Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        let (feed_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO feeds (url, title, description, site_url, favicon_url, last_fetched_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                site_url = excluded.site_url,
                favicon_url = excluded.favicon_url,
                last_fetched_at = excluded.last_fetched_at
            RETURNING id
        "#,
        )
        .bind(&metadata.url)
        .bind(&metadata.title)
        .bind(&metadata.description)
        .bind(&metadata.site_url)
        .bind(&metadata.favicon_url)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let new_articles = insert_articles(&mut tx, feed_id, items, now).await?;

        let feed: FeedRecord =
            sqlx::query_as(&format!("SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?"))
                .bind(feed_id)
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;

        Ok(ReconcileOutcome { feed, new_articles })
    }
}
