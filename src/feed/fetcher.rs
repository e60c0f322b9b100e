//! Safe retrieval of remote feed documents.
//!
//! Every fetch runs under a hard wall-clock timeout and a response size
//! ceiling, and the SSRF guard rejects loopback/private targets before any
//! network I/O happens. Redirects are followed (each hop re-checked against
//! the guard) and the post-redirect URL is reported back as the canonical
//! feed identity.

use futures::stream::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::redirect;
use std::time::Duration;
use thiserror::Error;

use crate::util::{parse_http_url, validate_feed_url, UrlGuardError};

const FEED_ACCEPT: &str = "application/rss+xml, application/atom+xml, application/xml, text/xml";

/// Errors that can occur while fetching a feed document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL failed validation; no network call was made.
    #[error(transparent)]
    Rejected(#[from] UrlGuardError),
    /// Network-level error (DNS, connection, TLS, redirect policy)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured wall-clock timeout
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    /// Response body exceeded the size ceiling
    #[error("Response larger than the {limit} byte ceiling")]
    ResponseTooLarge { limit: usize },
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// A fetched document plus the post-redirect URL it actually came from.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub body: Vec<u8>,
    /// Canonical feed identity: where the document lives after redirects.
    pub final_url: String,
}

/// HTTP retrieval with fixed safety ceilings.
///
/// Cloning is cheap (the inner reqwest client is reference-counted), so one
/// fetcher is shared across all concurrent pipeline units.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
    allow_private_networks: bool,
}

impl Fetcher {
    pub const DEFAULT_MAX_BYTES: usize = 10 * 1024 * 1024; // 10 MiB

    /// Builds a fetcher with the standard public-internet guard.
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self, reqwest::Error> {
        Self::build(timeout, max_bytes, false)
    }

    /// Builds a fetcher that also accepts loopback and private-network
    /// targets. Only for deployments that deliberately ingest intranet
    /// feeds — this disables the SSRF guard's host checks.
    pub fn new_allowing_private_networks(
        timeout: Duration,
        max_bytes: usize,
    ) -> Result<Self, reqwest::Error> {
        Self::build(timeout, max_bytes, true)
    }

    fn build(
        timeout: Duration,
        max_bytes: usize,
        allow_private_networks: bool,
    ) -> Result<Self, reqwest::Error> {
        // Redirect hops are re-validated so a public URL cannot bounce the
        // request into a private network.
        let policy = if allow_private_networks {
            redirect::Policy::limited(10)
        } else {
            redirect::Policy::custom(|attempt| {
                if attempt.previous().len() > 10 {
                    return attempt.error("too many redirects");
                }
                match validate_feed_url(attempt.url().as_str()) {
                    Ok(_) => attempt.follow(),
                    Err(err) => attempt.error(err),
                }
            })
        };

        let client = reqwest::Client::builder()
            .user_agent(concat!("feedmill/", env!("CARGO_PKG_VERSION")))
            .redirect(policy)
            .build()?;

        Ok(Self {
            client,
            timeout,
            max_bytes,
            allow_private_networks,
        })
    }

    /// Retrieves `url`, returning the body and the post-redirect URL.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Rejected`] — URL failed validation; nothing was sent
    /// - [`FetchError::Timeout`] — the whole transfer exceeded the budget
    /// - [`FetchError::HttpStatus`] — non-2xx response
    /// - [`FetchError::ResponseTooLarge`] — advertised or streamed size over
    ///   the ceiling
    /// - [`FetchError::IncompleteResponse`] — body shorter than advertised
    /// - [`FetchError::Network`] — everything else reqwest can fail with
    pub async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError> {
        let url = if self.allow_private_networks {
            parse_http_url(url)?
        } else {
            validate_feed_url(url)?
        };

        // One budget for the entire transfer, headers and body both; a
        // trickling origin cannot hold a pipeline slot open indefinitely.
        tokio::time::timeout(self.timeout, self.fetch_inner(url))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout.as_secs()))?
    }

    async fn fetch_inner(&self, url: url::Url) -> Result<FetchedDocument, FetchError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, FEED_ACCEPT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        let final_url = response.url().to_string();
        let body = self.read_limited(response).await?;

        Ok(FetchedDocument { body, final_url })
    }

    async fn read_limited(&self, response: reqwest::Response) -> Result<Vec<u8>, FetchError> {
        // Capture Content-Length for the fast path and completeness check
        let expected_length = response.content_length();

        // Fast path: an honestly-advertised oversize body fails before a
        // single byte is read.
        if let Some(len) = expected_length {
            if len as usize > self.max_bytes {
                return Err(FetchError::ResponseTooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        // Streaming path: the header may be absent or lying, so the cap is
        // enforced again while accumulating.
        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(FetchError::Network)?;
            if bytes.len().saturating_add(chunk.len()) > self.max_bytes {
                return Err(FetchError::ResponseTooLarge {
                    limit: self.max_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        // A short read means the transfer was cut; surfacing it beats
        // feeding a truncated document to the parser.
        if let Some(expected) = expected_length {
            if (bytes.len() as u64) < expected {
                return Err(FetchError::IncompleteResponse {
                    expected,
                    received: bytes.len(),
                });
            }
        }

        Ok(bytes)
    }
}
