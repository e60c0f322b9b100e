//! RSS 2.0 / Atom normalization.
//!
//! Detection is structural: a document with an RSS `channel` parses as RSS,
//! otherwise a `feed` element parses as Atom, and anything else is a hard
//! [`ParseError::UnknownFormat`] — there is no best-effort fallback. Field
//! extraction follows fixed first-match-wins chains so that a given document
//! always yields the same canonical form, including the same synthesized
//! guids.

use chrono::DateTime;
use thiserror::Error;

use super::xml::{parse_document, XmlElement, XmlError};

#[derive(Debug, Error)]
pub enum ParseError {
    /// The document is not well-formed XML.
    #[error(transparent)]
    Xml(#[from] XmlError),
    /// Well-formed XML, but neither an RSS channel nor an Atom feed.
    #[error("unrecognized feed format: expected an RSS channel or an Atom feed")]
    UnknownFormat,
}

/// Canonical form of one feed document.
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub title: String,
    pub description: Option<String>,
    pub site_url: Option<String>,
    pub items: Vec<ParsedItem>,
}

/// Canonical form of one item/entry.
///
/// `guid` is the dedup key within a feed. Items without an explicit
/// guid/id fall back to their link, and items without either get the
/// synthesized `"{sourceUrl}-{title}"` key. That last fallback is
/// collision-prone (two untitled, linkless items from the same feed
/// collapse into one), which is a documented limitation: changing the
/// derivation would change article identity for already-ingested content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedItem {
    pub guid: String,
    pub title: String,
    pub url: String,
    pub author: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    /// Unix timestamp; an absent or unparseable date is None, never an error.
    pub published_at: Option<i64>,
}

/// Parses an RSS 2.0 or Atom document fetched from `source_url`.
pub fn parse_feed(document: &[u8], source_url: &str) -> Result<ParsedFeed, ParseError> {
    let text = String::from_utf8_lossy(document);
    let root = parse_document(&text)?;

    if let Some(channel) = root.find_named("channel") {
        return Ok(parse_rss(channel, source_url));
    }
    if let Some(feed) = root.find_named("feed") {
        return Ok(parse_atom(feed, source_url));
    }
    Err(ParseError::UnknownFormat)
}

fn parse_rss(channel: &XmlElement, source_url: &str) -> ParsedFeed {
    ParsedFeed {
        title: nonempty_text(channel, "title").unwrap_or_else(|| "Untitled Feed".to_string()),
        description: nonempty_text(channel, "description"),
        site_url: nonempty_text(channel, "link"),
        items: channel
            .children_named("item")
            .map(|item| rss_item(item, source_url))
            .collect(),
    }
}

fn rss_item(item: &XmlElement, source_url: &str) -> ParsedItem {
    let title = nonempty_text(item, "title").unwrap_or_else(|| "Untitled".to_string());
    let url = nonempty_text(item, "link").unwrap_or_default();
    let guid = item_guid(nonempty_text(item, "guid"), &url, source_url, &title);
    let author = nonempty_text(item, "author").or_else(|| nonempty_text(item, "dc:creator"));
    let content =
        nonempty_text(item, "content:encoded").or_else(|| nonempty_text(item, "description"));
    let summary = dedup_summary(nonempty_text(item, "description"), content.as_deref());
    let published_at = nonempty_text(item, "pubDate").and_then(|raw| parse_timestamp(&raw));

    ParsedItem {
        guid,
        title,
        url,
        author,
        content,
        summary,
        published_at,
    }
}

fn parse_atom(feed: &XmlElement, source_url: &str) -> ParsedFeed {
    ParsedFeed {
        title: nonempty_text(feed, "title").unwrap_or_else(|| "Untitled Feed".to_string()),
        description: nonempty_text(feed, "subtitle"),
        site_url: alternate_link(feed),
        items: feed
            .children_named("entry")
            .map(|entry| atom_entry(entry, source_url))
            .collect(),
    }
}

fn atom_entry(entry: &XmlElement, source_url: &str) -> ParsedItem {
    let title = nonempty_text(entry, "title").unwrap_or_else(|| "Untitled".to_string());
    let url = alternate_link(entry).unwrap_or_default();
    let guid = item_guid(nonempty_text(entry, "id"), &url, source_url, &title);
    let author = entry
        .child("author")
        .and_then(|author| nonempty_text(author, "name"));
    let content = nonempty_text(entry, "content").or_else(|| nonempty_text(entry, "summary"));
    let summary = dedup_summary(nonempty_text(entry, "summary"), content.as_deref());
    let published_at = nonempty_text(entry, "published")
        .or_else(|| nonempty_text(entry, "updated"))
        .and_then(|raw| parse_timestamp(&raw));

    ParsedItem {
        guid,
        title,
        url,
        author,
        content,
        summary,
        published_at,
    }
}

/// Trimmed text content of the first matching child, if non-empty.
fn nonempty_text(parent: &XmlElement, name: &str) -> Option<String> {
    let text = parent.child(name)?.text();
    (!text.is_empty()).then_some(text)
}

/// Guid chain: explicit element, else the item link, else a key synthesized
/// from the source URL and title.
fn item_guid(explicit: Option<String>, url: &str, source_url: &str, title: &str) -> String {
    explicit
        .or_else(|| (!url.is_empty()).then(|| url.to_string()))
        .unwrap_or_else(|| format!("{source_url}-{title}"))
}

/// The short-form field, dropped when it duplicates the content verbatim —
/// there is no point storing the same text twice.
fn dedup_summary(summary: Option<String>, content: Option<&str>) -> Option<String> {
    summary.filter(|s| content != Some(s.as_str()))
}

/// The `link` marked `rel="alternate"`, else the first `link`.
fn alternate_link(parent: &XmlElement) -> Option<String> {
    let links: Vec<&XmlElement> = parent.children_named("link").collect();
    links
        .iter()
        .find(|link| link.attr("rel") == Some("alternate"))
        .or_else(|| links.first())
        .and_then(|link| link.attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_string)
}

fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.timestamp())
}
