use sqlx::{QueryBuilder, Sqlite, Transaction};

use super::schema::Database;
use super::types::{ArticleRecord, NewArticle, StorageError};

/// Chunk size for batched article inserts; SQLite's bind-parameter ceiling
/// allows far more, this keeps statements readable in logs.
const BATCH_SIZE: usize = 50;

/// Inserts articles for a feed inside an open reconcile transaction.
///
/// Insert-only by policy: `INSERT OR IGNORE` on the `(feed_id, guid)` key
/// means an already-stored article is never overwritten, however the feed
/// republishes it. Returns the number of rows actually inserted, counted
/// via `changes()` after each chunk (no table scans).
pub(crate) async fn insert_articles(
    tx: &mut Transaction<'_, Sqlite>,
    feed_id: i64,
    items: &[NewArticle],
    now: i64,
) -> Result<usize, StorageError> {
    let mut inserted = 0usize;

    for chunk in items.chunks(BATCH_SIZE) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT OR IGNORE INTO articles \
             (feed_id, guid, title, url, author, content, summary, published_at, created_at) ",
        );

        builder.push_values(chunk, |mut b, article| {
            b.push_bind(feed_id)
                .push_bind(&article.guid)
                .push_bind(&article.title)
                .push_bind(&article.url)
                .push_bind(&article.author)
                .push_bind(&article.content)
                .push_bind(&article.summary)
                .push_bind(article.published_at)
                .push_bind(now);
        });

        builder.build().execute(&mut **tx).await?;

        let changes: (i64,) = sqlx::query_as("SELECT changes()")
            .fetch_one(&mut **tx)
            .await?;
        inserted += changes.0 as usize;
    }

    Ok(inserted)
}

impl Database {
    // ========================================================================
    // Article Operations
    // ========================================================================

    /// Number of stored articles for a feed
    pub async fn count_articles(&self, feed_id: i64) -> Result<i64, StorageError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    /// All articles for a feed, newest first
    pub async fn get_articles_for_feed(
        &self,
        feed_id: i64,
    ) -> Result<Vec<ArticleRecord>, StorageError> {
        let articles = sqlx::query_as(
            r#"
            SELECT id, feed_id, guid, title, url, author, content, summary,
                   published_at, created_at
            FROM articles
            WHERE feed_id = ?
            ORDER BY published_at DESC, created_at DESC
        "#,
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, FeedMetadata, NewArticle};

    async fn db_with_feed() -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let outcome = db
            .reconcile(
                &FeedMetadata {
                    url: "https://example.com/feed.xml".to_string(),
                    title: "Feed".to_string(),
                    description: None,
                    site_url: None,
                    favicon_url: None,
                },
                &[],
            )
            .await
            .unwrap();
        (db, outcome.feed.id)
    }

    fn article(guid: &str, title: &str) -> NewArticle {
        NewArticle {
            guid: guid.to_string(),
            title: title.to_string(),
            url: format!("https://example.com/{guid}"),
            author: None,
            content: Some("original body".to_string()),
            summary: None,
            published_at: None,
        }
    }

    async fn reconcile_articles(db: &Database, items: &[NewArticle]) -> usize {
        db.reconcile(
            &FeedMetadata {
                url: "https://example.com/feed.xml".to_string(),
                title: "Feed".to_string(),
                description: None,
                site_url: None,
                favicon_url: None,
            },
            items,
        )
        .await
        .unwrap()
        .new_articles
    }

    #[tokio::test]
    async fn test_conflicting_guid_is_never_overwritten() {
        let (db, feed_id) = db_with_feed().await;

        assert_eq!(reconcile_articles(&db, &[article("g", "First title")]).await, 1);

        // Same guid, edited text: the stored row must not move
        let mut edited = article("g", "Edited title");
        edited.content = Some("edited body".to_string());
        assert_eq!(reconcile_articles(&db, &[edited]).await, 0);

        let stored = db.get_articles_for_feed(feed_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "First title");
        assert_eq!(stored[0].content.as_deref(), Some("original body"));
    }

    #[tokio::test]
    async fn test_duplicate_guids_within_one_batch_collapse() {
        let (db, feed_id) = db_with_feed().await;

        let inserted = reconcile_articles(
            &db,
            &[article("dup", "One"), article("dup", "Two"), article("x", "X")],
        )
        .await;

        assert_eq!(inserted, 2);
        assert_eq!(db.count_articles(feed_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_batch_chunking() {
        let (db, feed_id) = db_with_feed().await;

        let items: Vec<NewArticle> = (0..120)
            .map(|i| article(&format!("guid-{i}"), &format!("Title {i}")))
            .collect();

        assert_eq!(reconcile_articles(&db, &items).await, 120);
        assert_eq!(db.count_articles(feed_id).await.unwrap(), 120);
    }
}
