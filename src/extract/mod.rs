//! Article content extraction with an ordered fallback chain.
//!
//! A [`ContentExtractor`] holds a list of [`ExtractionStrategy`] trait
//! objects and tries them in order until one yields text longer than the
//! minimum length:
//!
//! | # | Strategy | Module |
//! |---|----------|--------|
//! | 1 | `downloader+readability`: external downloader into a temp file, in-process readability | [`downloader`] |
//! | 2 | `readability-subprocess`: a separate extractor process printing JSON | [`subprocess`] |
//! | 3 | `direct-http`: plain GET, in-process readability | [`direct`] |
//!
//! The domain rate limiter is consulted before every attempt, not once per
//! article, because every strategy hits the article's host again.
//!
//! Readability parsing is CPU-bound; it runs on a [`BlockingPool`] so the
//! single-threaded event loop keeps serving network I/O.

pub mod direct;
pub mod downloader;
pub mod engine;
pub mod subprocess;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::coordinator::ArticleExtract;
use crate::error::{ExtractError, ExtractResult};
use crate::models::ExtractionInfo;
use crate::rate_limiter::DomainRateLimiter;

/// What a single strategy pulled out of an article page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContent {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub date: Option<String>,
    pub language: Option<String>,
    pub top_image: Option<String>,
    pub text: String,
    pub html: Option<String>,
}

/// Outcome of the whole chain for one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: Option<String>,
    pub html: Option<String>,
    pub authors: Vec<String>,
    pub top_image: Option<String>,
    pub language: Option<String>,
    pub info: ExtractionInfo,
}

impl Extraction {
    fn succeeded(strategy: &str, page: PageContent) -> Self {
        let info = ExtractionInfo {
            extractor_name: strategy.to_string(),
            success: true,
            error: None,
            title: page.title,
            author: (!page.authors.is_empty()).then(|| page.authors.join(", ")),
            date: page.date,
            text_length: Some(page.text.chars().count()),
        };
        Self {
            text: Some(page.text),
            html: page.html,
            authors: page.authors,
            top_image: page.top_image,
            language: page.language,
            info,
        }
    }

    fn failed(info: ExtractionInfo) -> Self {
        Self {
            text: None,
            html: None,
            authors: Vec::new(),
            top_image: None,
            language: None,
            info,
        }
    }
}

/// One way of turning an article URL into text.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Stable name recorded in [`ExtractionInfo::extractor_name`].
    fn name(&self) -> &'static str;

    async fn extract(&self, url: &str) -> ExtractResult<PageContent>;
}

/// Bounded pool for blocking work (HTML parsing, readability).
///
/// At most `workers` closures run on tokio's blocking threads at once; the
/// rest wait for a permit without blocking the event loop.
#[derive(Debug, Clone)]
pub struct BlockingPool {
    permits: Arc<Semaphore>,
}

impl BlockingPool {
    pub fn new(workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    pub async fn run<F, T>(&self, job: F) -> ExtractResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| ExtractError::Worker(e.to_string()))?;
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| ExtractError::Worker(e.to_string()))
    }
}

/// Runs the strategy chain for one URL at a time.
pub struct ContentExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    limiter: Arc<DomainRateLimiter>,
    min_text_length: usize,
}

impl ContentExtractor {
    pub fn new(
        strategies: Vec<Box<dyn ExtractionStrategy>>,
        limiter: Arc<DomainRateLimiter>,
        min_text_length: usize,
    ) -> Self {
        Self {
            strategies,
            limiter,
            min_text_length,
        }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Try each strategy in order and stop at the first good-enough text.
    ///
    /// Never fails: if every strategy fails, the returned info describes the
    /// last failure.
    #[instrument(level = "info", skip_all, fields(%url))]
    pub async fn extract(&self, url: &str) -> Extraction {
        let mut last_failure = ExtractionInfo::failure("none", ExtractError::NoContent);

        for strategy in &self.strategies {
            let name = strategy.name();
            self.limiter.throttle_url(url).await;

            let err = match strategy.extract(url).await {
                Ok(page) => {
                    let len = page.text.chars().count();
                    if len > self.min_text_length {
                        info!(strategy = name, chars = len, "Extracted article");
                        return Extraction::succeeded(name, page);
                    }
                    ExtractError::TooShort {
                        len,
                        min: self.min_text_length,
                    }
                }
                Err(e) => e,
            };

            warn!(strategy = name, error = %err, "Extraction strategy failed; falling back");
            last_failure = ExtractionInfo::failure(name, err);
        }

        debug!(strategy = %last_failure.extractor_name, "All extraction strategies failed");
        Extraction::failed(last_failure)
    }
}

#[async_trait]
impl ArticleExtract for ContentExtractor {
    async fn extract(&self, url: &str) -> Extraction {
        ContentExtractor::extract(self, url).await
    }
}
