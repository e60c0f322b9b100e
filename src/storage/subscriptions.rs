use chrono::Utc;

use super::schema::Database;
use super::types::{StorageError, SubscriptionRecord};

impl Database {
    // ========================================================================
    // Subscription Operations
    // ========================================================================

    /// Attaches a user to a feed, keyed on `(user_id, feed_id)`.
    ///
    /// A supplied folder moves an existing subscription into it; without one
    /// the existing row (and its folder) is left alone. `custom_title` is
    /// collaborator-owned and never touched here. The attach is independent
    /// of whether the feed or its articles were newly created.
    pub async fn attach_subscription(
        &self,
        user_id: &str,
        feed_id: i64,
        folder_id: Option<i64>,
    ) -> Result<(), StorageError> {
        let now = Utc::now().timestamp();

        match folder_id {
            Some(folder_id) => {
                sqlx::query(
                    r#"
                    INSERT INTO user_feeds (user_id, feed_id, folder_id, created_at)
                    VALUES (?, ?, ?, ?)
                    ON CONFLICT(user_id, feed_id) DO UPDATE SET folder_id = excluded.folder_id
                "#,
                )
                .bind(user_id)
                .bind(feed_id)
                .bind(folder_id)
                .bind(now)
                .execute(&self.pool)
                .await?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO user_feeds (user_id, feed_id, created_at)
                    VALUES (?, ?, ?)
                    ON CONFLICT(user_id, feed_id) DO NOTHING
                "#,
                )
                .bind(user_id)
                .bind(feed_id)
                .bind(now)
                .execute(&self.pool)
                .await?;
            }
        }

        Ok(())
    }

    /// Get one user's subscription to a feed
    pub async fn get_subscription(
        &self,
        user_id: &str,
        feed_id: i64,
    ) -> Result<Option<SubscriptionRecord>, StorageError> {
        let subscription = sqlx::query_as(
            r#"
            SELECT id, user_id, feed_id, folder_id, custom_title, created_at
            FROM user_feeds
            WHERE user_id = ? AND feed_id = ?
        "#,
        )
        .bind(user_id)
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(subscription)
    }
}
