//! Small shared utilities.
//!
//! - **URL validation**: security-focused validation to prevent SSRF attacks
//! - **Favicon derivation**: deterministic favicon URL from a site hostname

mod favicon;
mod url_guard;

pub use favicon::favicon_url;
pub use url_guard::{parse_http_url, validate_feed_url, UrlGuardError};
