use url::Url;

/// Derives a favicon URL from a site URL's hostname.
///
/// Purely deterministic string work — no request is made here; the returned
/// URL points at Google's s2 favicon endpoint and is only ever dereferenced
/// by downstream presentation layers.
pub fn favicon_url(site_url: &str) -> Option<String> {
    let url = Url::parse(site_url).ok()?;
    let host = url.host_str()?;
    Some(format!(
        "https://www.google.com/s2/favicons?domain={host}&sz=32"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_favicon_from_site_url() {
        assert_eq!(
            favicon_url("https://blog.example.com/posts").as_deref(),
            Some("https://www.google.com/s2/favicons?domain=blog.example.com&sz=32")
        );
    }

    #[test]
    fn test_favicon_ignores_path_and_port() {
        assert_eq!(
            favicon_url("http://example.org:8080/x/y?z=1").as_deref(),
            Some("https://www.google.com/s2/favicons?domain=example.org&sz=32")
        );
    }

    #[test]
    fn test_favicon_invalid_input() {
        assert!(favicon_url("not a url").is_none());
        assert!(favicon_url("").is_none());
    }
}
