//! HTTP surface over the engine.
//!
//! One ingestion endpoint plus a health probe. Identity arrives as an opaque
//! bearer token — verification belongs to the fronting collaborator, this
//! layer only requires presence and hands the token to the rate limiter.
//! CORS echoes the configured origin allow-list; a wildcard is never
//! emitted, so an empty list means no cross-origin access at all.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::engine::{Engine, IngestOutcome, IngestRequest, Subscriber};
use crate::error::EngineError;

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
}

/// Wire shape of the ingestion request body. `feed_url` wins over `feed_id`;
/// an empty body requests a full sweep.
#[derive(Debug, Default, Deserialize)]
pub struct IngestBody {
    pub feed_url: Option<String>,
    pub feed_id: Option<i64>,
    pub subscriber_id: Option<String>,
    pub folder_id: Option<i64>,
}

impl IngestBody {
    fn into_request(self) -> IngestRequest {
        if let Some(feed_url) = self.feed_url {
            let subscriber = self.subscriber_id.map(|user_id| Subscriber {
                user_id,
                folder_id: self.folder_id,
            });
            IngestRequest::SubscribeUrl {
                feed_url,
                subscriber,
            }
        } else if let Some(feed_id) = self.feed_id {
            IngestRequest::RefreshFeed { feed_id }
        } else {
            IngestRequest::Sweep
        }
    }
}

/// Builds the service router.
pub fn router(engine: Arc<Engine>, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/v1/ingest", post(ingest))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(allowed_origins))
        .with_state(AppState { engine })
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_origin(origins)
}

async fn health() -> &'static str {
    "OK"
}

async fn ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<IngestBody>, JsonRejection>,
) -> Response {
    // Identity first: an unauthenticated caller learns nothing about the
    // body's validity
    let Some(identity) = bearer_identity(&headers) else {
        return error_response(&EngineError::Auth);
    };

    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return error_response(&EngineError::Validation(format!(
                "malformed request body: {rejection}"
            )))
        }
    };

    match state.engine.invoke(&identity, body.into_request()).await {
        Ok(outcome) => success_response(outcome),
        Err(err) => error_response(&err),
    }
}

fn bearer_identity(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn success_response(outcome: IngestOutcome) -> Response {
    let body = match outcome {
        IngestOutcome::Subscribed { feed, new_articles } => json!({
            "success": true,
            "feed": feed,
            "article_count": new_articles,
        }),
        IngestOutcome::Refreshed {
            feed_id,
            new_articles,
        } => json!({
            "success": true,
            "feed_id": feed_id,
            "article_count": new_articles,
        }),
        IngestOutcome::Swept { results } => json!({
            "success": true,
            "results": results,
        }),
    };
    (StatusCode::OK, Json(body)).into_response()
}

fn error_response(err: &EngineError) -> Response {
    let status =
        StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(json!({
            "success": false,
            "error": err.to_string(),
            "status": err.status(),
        })),
    )
        .into_response()
}
