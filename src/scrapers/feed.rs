//! Fetch one feed and turn its entries into [`CandidateArticle`]s.
//!
//! Failures never escape [`FeedFetcher::fetch`]: a bad status, a malformed
//! document or exhausted retries are logged and yield an empty list, so a
//! single broken outlet cannot take down the batch it belongs to.

use async_trait::async_trait;
use itertools::Itertools;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::coordinator::FeedFetch;
use crate::error::{FetchError, FetchResult};
use crate::models::{CandidateArticle, FeedSource};
use crate::rate_limiter::DomainRateLimiter;
use crate::scrapers::parse::{FeedEntry, parse_feed};
use crate::triage::{Triage, classify};

/// Fetches feeds over HTTP with a per-domain throttle and timeout retries.
pub struct FeedFetcher {
    client: Client,
    limiter: Arc<DomainRateLimiter>,
    max_retries: u32,
    retry_pause: Duration,
}

impl FeedFetcher {
    /// `client` should already carry the feed timeout and user agent
    /// (see [`crate::scrapers::build_client`]).
    pub fn new(
        client: Client,
        limiter: Arc<DomainRateLimiter>,
        max_retries: u32,
        retry_pause: Duration,
    ) -> Self {
        Self {
            client,
            limiter,
            max_retries,
            retry_pause,
        }
    }

    /// Fetch and parse `feed`, returning triaged candidates.
    #[instrument(level = "info", skip_all, fields(source = %feed.source_name, url = %feed.feed_url))]
    pub async fn fetch(&self, feed: &FeedSource) -> Vec<CandidateArticle> {
        let body = match self.fetch_body(&feed.feed_url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Feed fetch failed; treating as empty");
                return Vec::new();
            }
        };

        let entries = match parse_feed(&body) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Feed could not be parsed; treating as empty");
                return Vec::new();
            }
        };

        let total = entries.len();
        let candidates = candidates_from_entries(feed, entries);
        info!(entries = total, accepted = candidates.len(), "Indexed feed");
        debug!(urls = ?candidates.iter().map(|c| &c.url).collect::<Vec<_>>(), "Feed candidates");
        candidates
    }

    /// GET the feed body, retrying only on transient network failures.
    async fn fetch_body(&self, url: &str) -> FetchResult<String> {
        let attempts = self.max_retries + 1;
        for attempt in 1..=attempts {
            self.limiter.throttle_url(url).await;

            match self.get_once(url).await {
                Ok(body) => return Ok(body),
                Err(FetchError::Http(e)) if is_transient(&e) && attempt < attempts => {
                    warn!(attempt, max = attempts, error = %e, "Transient feed error; retrying");
                    sleep(self.retry_pause).await;
                }
                Err(FetchError::Http(e)) if is_transient(&e) => {
                    return Err(FetchError::Timeout {
                        url: url.to_string(),
                        attempts,
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Err(FetchError::Timeout {
            url: url.to_string(),
            attempts,
        })
    }

    async fn get_once(&self, url: &str) -> FetchResult<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl FeedFetch for FeedFetcher {
    async fn fetch(&self, feed: &FeedSource) -> Vec<CandidateArticle> {
        FeedFetcher::fetch(self, feed).await
    }
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect()
}

/// Keep entries with a link that passes triage, first occurrence of each URL wins.
pub fn candidates_from_entries(feed: &FeedSource, entries: Vec<FeedEntry>) -> Vec<CandidateArticle> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let link = entry.link?;
            match classify(&link) {
                Triage::Accept => Some(CandidateArticle::new(
                    feed,
                    link,
                    entry.title.unwrap_or_default(),
                    entry.published,
                )),
                Triage::Reject(reason) => {
                    debug!(url = %link, %reason, "Skipping non-article link");
                    None
                }
            }
        })
        .unique_by(|c| c.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::build_client;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(timeout: Duration, max_retries: u32) -> FeedFetcher {
        FeedFetcher::new(
            build_client("test-agent/1.0", timeout).unwrap(),
            Arc::new(DomainRateLimiter::disabled()),
            max_retries,
            Duration::from_millis(10),
        )
    }

    fn rss(links: &[&str]) -> String {
        let items: String = links
            .iter()
            .map(|l| format!("<item><title>T</title><link>{l}</link></item>"))
            .collect();
        format!(r#"<rss version="2.0"><channel><title>X</title>{items}</channel></rss>"#)
    }

    #[tokio::test]
    async fn test_fetch_triages_and_dedups_entries() {
        let server = MockServer::start().await;
        let body = rss(&[
            "https://site.com/2024/05/01/some-article-title",
            "https://site.com/category/politics",
            "https://site.com/",
            "https://site.com/2024/05/01/some-article-title",
            "https://site.com/world/2024/another-story",
        ]);
        Mock::given(method("GET"))
            .and(path("/rss.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let feed = FeedSource::new(format!("{}/rss.xml", server.uri()), "Site");
        let candidates = fetcher(Duration::from_secs(5), 0).fetch(&feed).await;

        let urls: Vec<_> = candidates.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://site.com/2024/05/01/some-article-title",
                "https://site.com/world/2024/another-story"
            ]
        );
        assert!(candidates.iter().all(|c| c.source_name == "Site"));
    }

    #[tokio::test]
    async fn test_fetch_keeps_entries_with_namespaced_extensions() {
        let server = MockServer::start().await;
        let body = r#"<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Wire</title>
    <item>
      <title>Flood defences fail</title>
      <media:title>Aerial photo</media:title>
      <atom:link href="https://site.com/related/floods" rel="related"/>
      <link>https://site.com/uk/2024/flood-defences-fail</link>
    </item>
  </channel>
</rss>"#;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let feed = FeedSource::new(format!("{}/rss.xml", server.uri()), "Wire");
        let candidates = fetcher(Duration::from_secs(5), 0).fetch(&feed).await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url, "https://site.com/uk/2024/flood-defences-fail");
        assert_eq!(candidates[0].title, "Flood defences fail");
    }

    #[tokio::test]
    async fn test_non_200_is_empty_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let feed = FeedSource::new(format!("{}/rss.xml", server.uri()), "Down");
        assert!(fetcher(Duration::from_secs(5), 3).fetch(&feed).await.is_empty());
    }

    #[tokio::test]
    async fn test_timeouts_are_retried_then_abandoned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(rss(&["https://site.com/a/b"]))
                    .set_delay(Duration::from_millis(500)),
            )
            .expect(3)
            .mount(&server)
            .await;

        let feed = FeedSource::new(format!("{}/rss.xml", server.uri()), "Slow");
        let candidates = fetcher(Duration::from_millis(100), 2).fetch(&feed).await;
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_feed_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not a feed</html>"))
            .mount(&server)
            .await;

        let feed = FeedSource::new(format!("{}/rss.xml", server.uri()), "Broken");
        assert!(fetcher(Duration::from_secs(5), 0).fetch(&feed).await.is_empty());
    }

    #[test]
    fn test_candidates_skip_entries_without_links() {
        let feed = FeedSource::new("https://site.com/rss.xml", "Site");
        let entries = vec![
            FeedEntry {
                title: Some("No link".to_string()),
                link: None,
                published: None,
            },
            FeedEntry {
                title: None,
                link: Some("https://site.com/news/untitled-story".to_string()),
                published: None,
            },
        ];
        let candidates = candidates_from_entries(&feed, entries);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "");
    }
}
