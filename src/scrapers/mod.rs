//! Feed scraping: fetch RSS/Atom documents and turn entries into candidates.
//!
//! Scraping follows the same two-phase pattern for every outlet:
//!
//! 1. **Indexing**: fetch the outlet's feed and collect entry links
//!    ([`feed::FeedFetcher`], parsing in [`parse`])
//! 2. **Triage**: drop links that do not look like individual articles
//!    ([`crate::triage`])
//!
//! Article bodies are not fetched here; that is the job of
//! [`crate::extract`].
//!
//! # Supported formats
//!
//! | Format | Root element | Entry element |
//! |--------|--------------|---------------|
//! | RSS 2.0 | `<rss>` | `<item>` |
//! | RSS 1.0 | `<rdf:RDF>` | `<item>` |
//! | Atom | `<feed>` | `<entry>` |

pub mod feed;
pub mod parse;

use reqwest::Client;
use std::time::Duration;

/// Build the HTTP client shared by feed fetches and direct article fetches.
pub fn build_client(user_agent: &str, timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .build()
}
