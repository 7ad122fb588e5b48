//! Typed errors for each pipeline stage.
//!
//! Failures below the batch level (one feed, one article, one extraction
//! strategy) are absorbed and logged by the stage that hits them, so most of
//! these never reach the binary. [`StorageError`] is the exception: a failed
//! batch transaction is handed back to the caller to retry or investigate.

use thiserror::Error;

/// Errors raised while fetching or parsing a single feed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("timed out after {attempts} attempts: {url}")]
    Timeout { url: String, attempts: u32 },

    #[error("feed parse error: {0}")]
    Parse(String),
}

/// Errors raised by a single extraction strategy.
///
/// Any of these cascades to the next strategy in the chain.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("`{program}` is not installed or not executable")]
    ToolMissing { program: String },

    #[error("`{program}` exited with {code:?}: {stderr}")]
    ProcessFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("malformed extractor output: {0}")]
    MalformedOutput(#[from] serde_json::Error),

    #[error("readability failed: {0}")]
    Readability(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("no content extracted")]
    NoContent,

    #[error("extracted text too short ({len} chars, need more than {min})")]
    TooShort { len: usize, min: usize },

    #[error("worker pool unavailable: {0}")]
    Worker(String),
}

/// Errors raised by the ingestion writer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("could not encode column `{column}`: {source}")]
    Encode {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while loading run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid setting: {0}")]
    Invalid(String),
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;
pub type ExtractResult<T> = std::result::Result<T, ExtractError>;
pub type StorageResult<T> = std::result::Result<T, StorageError>;
