//! URL triage: decide whether a link looks like an individual article.
//!
//! Feeds routinely link to section fronts, tag pages, author bios, live
//! blogs and podcast episodes alongside real stories. [`classify`] rejects
//! those cheaply before any extraction work is spent on them.
//!
//! The filter runs twice: once while a feed is parsed and again right before
//! extraction. Both call sites use this one function, so they always agree.

use std::fmt;
use url::Url;

/// Path fragments that mark a non-article page.
const DENYLIST: &[&str] = &[
    "/tag/",
    "/tags/",
    "/category/",
    "/categories/",
    "/author/",
    "/authors/",
    "/search/",
    "/video/",
    "/videos/",
    "/live/",
    "/gallery/",
    "/galleries/",
    "/section/",
    "/login",
    "/subscribe",
    "/comments",
    "/feed/",
    "/feeds/",
    "/rss/",
    "/podcast/",
    "/podcasts/",
    "/audio/",
];

/// Path endings of feed documents rather than pages.
const FEED_SUFFIXES: &[&str] = &["/feed", "/rss", ".rss", ".xml", "/atom"];

/// Minimum number of `/`-separated segments (host included) of an article URL.
const MIN_SEGMENTS: usize = 3;

/// Why a URL was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Unparseable,
    UnsupportedScheme,
    TooShallow,
    TrailingSlash,
    Denylisted(&'static str),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Unparseable => write!(f, "unparseable URL"),
            RejectReason::UnsupportedScheme => write!(f, "not http(s)"),
            RejectReason::TooShallow => write!(f, "homepage-like path"),
            RejectReason::TrailingSlash => write!(f, "section or category page"),
            RejectReason::Denylisted(fragment) => write!(f, "denylisted path `{fragment}`"),
        }
    }
}

/// Outcome of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Triage {
    Accept,
    Reject(RejectReason),
}

/// Classify a candidate URL as article-like or not. Pure and total.
pub fn classify(url: &str) -> Triage {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return Triage::Reject(RejectReason::Unparseable);
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return Triage::Reject(RejectReason::UnsupportedScheme);
    }

    let path = parsed.path().to_ascii_lowercase();
    if path.ends_with('/') {
        return Triage::Reject(RejectReason::TrailingSlash);
    }

    let segments = 1 + path.split('/').filter(|s| !s.is_empty()).count();
    if segments < MIN_SEGMENTS {
        return Triage::Reject(RejectReason::TooShallow);
    }

    if let Some(fragment) = DENYLIST.iter().copied().find(|f| path.contains(f)) {
        return Triage::Reject(RejectReason::Denylisted(fragment));
    }
    if let Some(suffix) = FEED_SUFFIXES.iter().copied().find(|s| path.ends_with(s)) {
        return Triage::Reject(RejectReason::Denylisted(suffix));
    }

    Triage::Accept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_article_url(url: &str) -> bool {
        classify(url) == Triage::Accept
    }

    #[test]
    fn test_accepts_dated_article() {
        assert_eq!(
            classify("https://site.com/2024/05/01/some-article-title"),
            Triage::Accept
        );
        assert!(is_article_url("https://www.bbc.com/news/world-europe-68912345"));
    }

    #[test]
    fn test_rejects_homepage() {
        assert_eq!(
            classify("https://site.com/"),
            Triage::Reject(RejectReason::TrailingSlash)
        );
        assert_eq!(
            classify("https://site.com"),
            Triage::Reject(RejectReason::TrailingSlash)
        );
        assert_eq!(
            classify("https://site.com/about"),
            Triage::Reject(RejectReason::TooShallow)
        );
    }

    #[test]
    fn test_rejects_category_and_author_pages() {
        assert_eq!(
            classify("https://site.com/category/politics"),
            Triage::Reject(RejectReason::Denylisted("/category/"))
        );
        assert_eq!(
            classify("https://site.com/author/jane"),
            Triage::Reject(RejectReason::Denylisted("/author/"))
        );
        assert!(!is_article_url("https://site.com/news/politics/"));
    }

    #[test]
    fn test_rejects_media_and_account_paths() {
        for url in [
            "https://site.com/video/2024/clip-of-the-day",
            "https://site.com/live/2024/election-night",
            "https://site.com/gallery/best-photos-2024",
            "https://site.com/account/login",
            "https://site.com/news/subscribe-now",
            "https://site.com/story/123/comments",
            "https://site.com/shows/podcast/episode-12",
            "https://site.com/news/rss",
            "https://site.com/world/feed.xml",
        ] {
            assert!(!is_article_url(url), "{url} should be rejected");
        }
    }

    #[test]
    fn test_denylist_is_case_insensitive() {
        assert!(!is_article_url("https://site.com/Category/Politics"));
    }

    #[test]
    fn test_never_panics_on_garbage() {
        assert_eq!(classify(""), Triage::Reject(RejectReason::Unparseable));
        assert_eq!(
            classify("not a url at all"),
            Triage::Reject(RejectReason::Unparseable)
        );
        assert_eq!(
            classify("ftp://site.com/a/b/c"),
            Triage::Reject(RejectReason::UnsupportedScheme)
        );
        assert_eq!(
            classify("mailto:someone@site.com"),
            Triage::Reject(RejectReason::UnsupportedScheme)
        );
    }

    #[test]
    fn test_query_string_does_not_hide_trailing_slash() {
        assert!(!is_article_url("https://site.com/news/?page=2"));
        assert!(is_article_url("https://site.com/news/story-1?utm_source=rss"));
    }
}
