mod articles;
mod feeds;
mod schema;
mod subscriptions;
mod types;

pub use schema::Database;
pub use types::{
    ArticleRecord, FeedMetadata, FeedRecord, NewArticle, ReconcileOutcome, StaleFeed,
    StorageError, SubscriptionRecord,
};
