//! Two-stage batching of feeds and articles.
//!
//! ```text
//! feeds ──chunks(batch_size)──▶ group 1 ─┐
//!                               group 2  │ sequential
//!                               ...     ─┘
//!
//! one group:  fetch every feed concurrently
//!             truncate each list to limit_per_feed
//!             round r = the r-th candidate of every feed that has one
//!             extract round r concurrently, await all, pause, round r+1
//! ```
//!
//! Rounds interleave feeds so one prolific outlet cannot starve the others,
//! and a round only hits each outlet once.
//!
//! The coordinator never touches storage; it hands back the articles that
//! passed the quality gate and the caller decides what to do with them.

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::extract::Extraction;
use crate::models::{CandidateArticle, FeedSource, ProcessedArticle};
use crate::triage::{Triage, classify};

/// Source of candidates for one feed.
#[async_trait]
pub trait FeedFetch: Send + Sync {
    async fn fetch(&self, feed: &FeedSource) -> Vec<CandidateArticle>;
}

/// Turns one article URL into text (or a recorded failure).
#[async_trait]
pub trait ArticleExtract: Send + Sync {
    async fn extract(&self, url: &str) -> Extraction;
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Feeds fetched concurrently per outer group.
    pub batch_size: usize,
    /// Extracted text must be strictly longer than this many characters.
    pub min_text_length: usize,
    /// Pause between extraction rounds.
    pub round_pause: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            min_text_length: 100,
            round_pause: Duration::from_secs(1),
        }
    }
}

/// Counters for one [`BatchCoordinator::run_with_stats`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub feeds: usize,
    /// Feeds that produced no candidates (failed or genuinely empty).
    pub empty_feeds: usize,
    /// Candidates kept after the per-feed limit.
    pub candidates: usize,
    pub rejected_by_triage: usize,
    pub attempted: usize,
    pub kept: usize,
    pub dropped: usize,
    /// Kept articles per winning extraction strategy.
    pub by_extractor: BTreeMap<String, usize>,
}

pub struct BatchCoordinator<F, E> {
    fetcher: F,
    extractor: E,
    config: CoordinatorConfig,
}

impl<F: FeedFetch, E: ArticleExtract> BatchCoordinator<F, E> {
    pub fn new(fetcher: F, extractor: E, config: CoordinatorConfig) -> Self {
        Self {
            fetcher,
            extractor,
            config,
        }
    }

    /// Fetch `feeds`, extract up to `limit_per_feed` articles from each and
    /// return the ones that passed the quality gate.
    pub async fn run(&self, feeds: &[FeedSource], limit_per_feed: usize) -> Vec<ProcessedArticle> {
        self.run_with_stats(feeds, limit_per_feed).await.0
    }

    #[instrument(level = "info", skip_all, fields(feeds = feeds.len(), limit_per_feed = limit_per_feed))]
    pub async fn run_with_stats(
        &self,
        feeds: &[FeedSource],
        limit_per_feed: usize,
    ) -> (Vec<ProcessedArticle>, RunStats) {
        let mut stats = RunStats {
            feeds: feeds.len(),
            ..Default::default()
        };
        let mut kept = Vec::new();
        let group_size = self.config.batch_size.max(1);

        for (group_index, group) in feeds.chunks(group_size).enumerate() {
            info!(group = group_index + 1, feeds = group.len(), "Fetching feed group");

            let lists = join_all(group.iter().map(|feed| self.fetcher.fetch(feed))).await;
            let lists: Vec<Vec<CandidateArticle>> = lists
                .into_iter()
                .map(|mut list| {
                    list.truncate(limit_per_feed);
                    list
                })
                .collect();

            stats.empty_feeds += lists.iter().filter(|l| l.is_empty()).count();
            stats.candidates += lists.iter().map(Vec::len).sum::<usize>();

            kept.extend(self.process_rounds(lists, &mut stats).await);
        }

        info!(
            feeds = stats.feeds,
            candidates = stats.candidates,
            attempted = stats.attempted,
            kept = stats.kept,
            dropped = stats.dropped,
            "Coordinator run complete"
        );
        (kept, stats)
    }

    async fn process_rounds(
        &self,
        lists: Vec<Vec<CandidateArticle>>,
        stats: &mut RunStats,
    ) -> Vec<ProcessedArticle> {
        let rounds = lists.iter().map(Vec::len).max().unwrap_or(0);
        let mut queues: Vec<_> = lists.into_iter().map(Vec::into_iter).collect();
        let mut kept = Vec::new();

        for round in 0..rounds {
            if round > 0 && !self.config.round_pause.is_zero() {
                sleep(self.config.round_pause).await;
            }

            let slice: Vec<CandidateArticle> = queues
                .iter_mut()
                .filter_map(Iterator::next)
                .filter(|c| match classify(&c.url) {
                    Triage::Accept => true,
                    Triage::Reject(reason) => {
                        debug!(url = %c.url, %reason, "Candidate rejected before extraction");
                        stats.rejected_by_triage += 1;
                        false
                    }
                })
                .collect();

            debug!(round = round + 1, of = rounds, articles = slice.len(), "Extraction round");
            stats.attempted += slice.len();

            let extractions = join_all(slice.iter().map(|c| self.extractor.extract(&c.url))).await;

            for (candidate, extraction) in slice.into_iter().zip(extractions) {
                let article = into_processed(candidate, extraction);
                if article.is_valid(self.config.min_text_length) {
                    *stats
                        .by_extractor
                        .entry(article.extraction_info.extractor_name.clone())
                        .or_default() += 1;
                    stats.kept += 1;
                    kept.push(article);
                } else {
                    warn!(
                        url = %article.url(),
                        chars = article.text_len(),
                        error = ?article.extraction_info.error,
                        "Dropping article that failed the quality gate"
                    );
                    stats.dropped += 1;
                }
            }
        }
        kept
    }
}

fn into_processed(mut candidate: CandidateArticle, extraction: Extraction) -> ProcessedArticle {
    if candidate.language.is_none() {
        candidate.language = extraction.language;
    }
    ProcessedArticle {
        candidate,
        text: extraction.text,
        html: extraction.html,
        authors: extraction.authors,
        top_image: extraction.top_image,
        extraction_info: extraction.info,
        scraped_at: Utc::now(),
    }
}
