//! The ingestion engine: one entry point, three request shapes.
//!
//! [`Engine::invoke`] gates the caller through the rate limiter, then runs
//! the fetch → parse → reconcile pipeline for a URL or a known feed id, or
//! drives the staleness sweep over every due feed. The sweep fans out
//! through a bounded worker pool and isolates each feed's failure into its
//! own result entry.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::error::EngineError;
use crate::feed::{parse_feed, Fetcher, ParsedFeed};
use crate::ratelimit::RateLimiter;
use crate::storage::{Database, FeedMetadata, FeedRecord, NewArticle, ReconcileOutcome};
use crate::util::favicon_url;

/// Identity to attach when a subscribe request carries one.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub user_id: String,
    pub folder_id: Option<i64>,
}

/// The three request shapes the engine accepts.
#[derive(Debug, Clone)]
pub enum IngestRequest {
    /// New subscription or ad-hoc refresh by URL
    SubscribeUrl {
        feed_url: String,
        subscriber: Option<Subscriber>,
    },
    /// Targeted refresh of a known feed
    RefreshFeed { feed_id: i64 },
    /// Full staleness sweep
    Sweep,
}

#[derive(Debug)]
pub enum IngestOutcome {
    Subscribed {
        feed: FeedRecord,
        new_articles: usize,
    },
    Refreshed {
        feed_id: i64,
        new_articles: usize,
    },
    Swept {
        results: Vec<SweepEntry>,
    },
}

/// Outcome for one feed within a sweep. Failures are data here, not errors:
/// one bad origin never aborts the rest of the sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepEntry {
    pub feed_id: i64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct Engine {
    db: Database,
    fetcher: Fetcher,
    limiter: Arc<RateLimiter>,
    refresh_interval: Duration,
    sweep_concurrency: usize,
}

impl Engine {
    pub fn new(
        db: Database,
        fetcher: Fetcher,
        limiter: Arc<RateLimiter>,
        refresh_interval: Duration,
        sweep_concurrency: usize,
    ) -> Self {
        Self {
            db,
            fetcher,
            limiter,
            refresh_interval,
            sweep_concurrency: sweep_concurrency.max(1),
        }
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Dispatches one request on behalf of `identity`.
    ///
    /// The rate limiter is consulted first; a denial short-circuits with no
    /// network or storage side effects. The identity is otherwise opaque —
    /// verification happened upstream.
    pub async fn invoke(
        &self,
        identity: &str,
        request: IngestRequest,
    ) -> Result<IngestOutcome, EngineError> {
        if identity.trim().is_empty() {
            return Err(EngineError::Auth);
        }
        if !self.limiter.allow(identity) {
            return Err(EngineError::RateLimited);
        }

        match request {
            IngestRequest::SubscribeUrl {
                feed_url,
                subscriber,
            } => {
                let outcome = self.ingest_url(&feed_url).await?;
                if let Some(subscriber) = subscriber {
                    self.db
                        .attach_subscription(
                            &subscriber.user_id,
                            outcome.feed.id,
                            subscriber.folder_id,
                        )
                        .await?;
                }
                Ok(IngestOutcome::Subscribed {
                    feed: outcome.feed,
                    new_articles: outcome.new_articles,
                })
            }
            IngestRequest::RefreshFeed { feed_id } => {
                let feed = self
                    .db
                    .get_feed(feed_id)
                    .await?
                    .ok_or(EngineError::FeedNotFound(feed_id))?;
                let outcome = self.ingest_url(&feed.url).await?;
                Ok(IngestOutcome::Refreshed {
                    feed_id: outcome.feed.id,
                    new_articles: outcome.new_articles,
                })
            }
            IngestRequest::Sweep => Ok(IngestOutcome::Swept {
                results: self.sweep().await?,
            }),
        }
    }

    /// Runs the full pipeline for one URL: fetch, parse, reconcile.
    ///
    /// Reconciliation always keys on the post-redirect URL, so the same
    /// canonical location resolves to the same feed row no matter which
    /// alias a caller subscribed through.
    async fn ingest_url(&self, url: &str) -> Result<ReconcileOutcome, EngineError> {
        let document = self.fetcher.fetch(url).await?;
        let parsed = parse_feed(&document.body, &document.final_url)?;
        let (metadata, items) = canonical_rows(parsed, document.final_url);

        let outcome = self.db.reconcile(&metadata, &items).await?;
        tracing::info!(
            feed_id = outcome.feed.id,
            url = %outcome.feed.url,
            new_articles = outcome.new_articles,
            "feed reconciled"
        );
        Ok(outcome)
    }

    /// Refreshes every feed whose last fetch is older than the refresh
    /// interval (or that has never been fetched), through a bounded worker
    /// pool. One entry per feed; a failure is captured in its entry and
    /// never disturbs the others.
    pub async fn sweep(&self) -> Result<Vec<SweepEntry>, EngineError> {
        let cutoff = chrono::Utc::now().timestamp() - self.refresh_interval.as_secs() as i64;
        let due = self.db.feeds_due_for_refresh(cutoff).await?;
        if due.is_empty() {
            return Ok(Vec::new());
        }

        tracing::info!(feeds = due.len(), "staleness sweep starting");
        let results = stream::iter(due)
            .map(|feed| {
                let engine = self.clone();
                async move {
                    match engine.ingest_url(&feed.url).await {
                        Ok(outcome) => SweepEntry {
                            feed_id: feed.id,
                            success: true,
                            article_count: Some(outcome.new_articles),
                            error: None,
                        },
                        Err(err) => {
                            tracing::warn!(
                                feed_id = feed.id,
                                url = %feed.url,
                                error = %err,
                                "sweep: feed refresh failed"
                            );
                            SweepEntry {
                                feed_id: feed.id,
                                success: false,
                                article_count: None,
                                error: Some(err.to_string()),
                            }
                        }
                    }
                }
            })
            .buffer_unordered(self.sweep_concurrency)
            .collect()
            .await;

        Ok(results)
    }
}

/// Maps a parsed feed onto storage rows, deriving the favicon from the
/// site URL's hostname.
fn canonical_rows(parsed: ParsedFeed, final_url: String) -> (FeedMetadata, Vec<NewArticle>) {
    let favicon = parsed.site_url.as_deref().and_then(favicon_url);
    let items = parsed
        .items
        .into_iter()
        .map(|item| NewArticle {
            guid: item.guid,
            title: item.title,
            url: item.url,
            author: item.author,
            content: item.content,
            summary: item.summary,
            published_at: item.published_at,
        })
        .collect();

    let metadata = FeedMetadata {
        url: final_url,
        title: parsed.title,
        description: parsed.description,
        site_url: parsed.site_url,
        favicon_url: favicon,
    };
    (metadata, items)
}
