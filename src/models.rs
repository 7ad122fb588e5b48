//! Data models for feeds, candidate articles and their processed representations.
//!
//! This module defines the records that flow through the pipeline:
//! - [`FeedSource`]: One configured RSS/Atom feed
//! - [`CandidateArticle`]: A feed entry whose link passed triage
//! - [`ProcessedArticle`]: A candidate after the extraction chain ran
//! - [`ExtractionInfo`]: Provenance of how extraction succeeded or failed
//!
//! Candidate ids are derived from the article URL with [`article_id`], so the
//! same URL always maps to the same storage primary key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One configured feed. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeedSource {
    /// The RSS/Atom document URL.
    #[serde(alias = "url")]
    pub feed_url: String,
    /// Human-readable outlet name; also the key stored sources are resolved by.
    pub source_name: String,
    /// Optional ISO country code of the outlet.
    #[serde(default)]
    pub country: Option<String>,
    /// Optional ISO language code of the outlet.
    #[serde(default)]
    pub language: Option<String>,
}

impl FeedSource {
    pub fn new(feed_url: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self {
            feed_url: feed_url.into(),
            source_name: source_name.into(),
            country: None,
            language: None,
        }
    }
}

/// A feed entry whose link was accepted by the triage filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateArticle {
    /// Fingerprint of `url`, see [`article_id`].
    pub id: String,
    pub url: String,
    pub title: String,
    pub publish_date: Option<DateTime<Utc>>,
    pub source_name: String,
    pub feed_url: String,
    pub country: Option<String>,
    pub language: Option<String>,
}

impl CandidateArticle {
    /// Build a candidate for `url` discovered in `feed`.
    pub fn new(
        feed: &FeedSource,
        url: impl Into<String>,
        title: impl Into<String>,
        publish_date: Option<DateTime<Utc>>,
    ) -> Self {
        let url = url.into();
        Self {
            id: article_id(&url),
            url,
            title: title.into(),
            publish_date,
            source_name: feed.source_name.clone(),
            feed_url: feed.feed_url.clone(),
            country: feed.country.clone(),
            language: feed.language.clone(),
        }
    }
}

/// Provenance of one extraction attempt.
///
/// Only the info of the attempt that produced the final result travels with
/// the article: the successful one, or the last failure if every strategy
/// failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionInfo {
    /// Which strategy produced this record (e.g. `"direct-http"`).
    pub extractor_name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_length: Option<usize>,
}

impl ExtractionInfo {
    pub fn failure(extractor_name: &str, error: impl ToString) -> Self {
        Self {
            extractor_name: extractor_name.to_string(),
            success: false,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }
}

/// A candidate after the extraction chain has run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedArticle {
    #[serde(flatten)]
    pub candidate: CandidateArticle,
    pub text: Option<String>,
    pub html: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    pub top_image: Option<String>,
    pub extraction_info: ExtractionInfo,
    pub scraped_at: DateTime<Utc>,
}

impl ProcessedArticle {
    pub fn id(&self) -> &str {
        &self.candidate.id
    }

    pub fn url(&self) -> &str {
        &self.candidate.url
    }

    /// Character count of the extracted text, zero when absent.
    pub fn text_len(&self) -> usize {
        self.text.as_deref().map_or(0, |t| t.chars().count())
    }

    /// Quality gate: extraction succeeded and the text is strictly longer
    /// than `min_text_length` characters.
    pub fn is_valid(&self, min_text_length: usize) -> bool {
        self.extraction_info.success && self.text_len() > min_text_length
    }

    /// Title to store: the feed title, else whatever the extractor found.
    pub fn best_title(&self) -> &str {
        if !self.candidate.title.trim().is_empty() {
            return &self.candidate.title;
        }
        self.extraction_info.title.as_deref().unwrap_or_default()
    }
}

/// Deterministic fingerprint of an article URL (lowercase hex SHA-256).
///
/// Surrounding whitespace is ignored; everything else is significant.
pub fn article_id(url: &str) -> String {
    let digest = Sha256::digest(url.trim().as_bytes());
    hex::encode(digest)
}
