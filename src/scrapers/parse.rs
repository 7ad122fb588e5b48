//! RSS 2.0, RSS 1.0 and Atom parsing on top of `feed-rs`.
//!
//! Only the fields the pipeline needs are kept (title, link, publish date);
//! everything else in a feed is ignored, including extension namespaces such
//! as Media RSS.

use chrono::{DateTime, Utc};
use feed_rs::model::Entry;

use crate::error::{FetchError, FetchResult};

/// One entry of a parsed feed, before triage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

impl From<Entry> for FeedEntry {
    fn from(entry: Entry) -> Self {
        // The `alternate` link (explicit or implied), else the first href.
        let link = entry
            .links
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| entry.links.first())
            .map(|l| l.href.clone());
        FeedEntry {
            title: clean(entry.title.map(|t| t.content)),
            link: clean(link),
            published: entry.published.or(entry.updated),
        }
    }
}

fn clean(s: Option<String>) -> Option<String> {
    s.map(|v| v.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|v| !v.is_empty())
}

/// HTML entities that show up in real feeds but are not defined in XML.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

/// Parse a feed document into entries.
///
/// A well-formed feed with no entries yields an empty list. Anything that is
/// not RSS or Atom is a [`FetchError::Parse`].
pub fn parse_feed(body: &str) -> FetchResult<Vec<FeedEntry>> {
    let xml = scrub_html_entities_for_xml(body.trim_start_matches('\u{feff}').trim_start());
    let feed = feed_rs::parser::parse(xml.as_bytes()).map_err(|e| FetchError::Parse(e.to_string()))?;
    Ok(feed.entries.into_iter().map(FeedEntry::from).collect())
}
