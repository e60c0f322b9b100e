//! Feed retrieval and normalization.
//!
//! - [`fetcher`] - HTTP retrieval under timeout/size ceilings with the SSRF guard
//! - [`xml`] - typed XML element tree the parser reads from
//! - [`parser`] - RSS 2.0 / Atom → [`ParsedFeed`] canonicalization

mod fetcher;
mod parser;
mod xml;

pub use fetcher::{FetchError, FetchedDocument, Fetcher};
pub use parser::{parse_feed, ParseError, ParsedFeed, ParsedItem};
pub use xml::XmlError;
