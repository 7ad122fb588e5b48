//! # Awful News Ingest
//!
//! Harvests news articles from RSS/Atom feeds, extracts clean article text
//! through a chain of fallback extractors, and stores each article exactly
//! once in SQLite.
//!
//! ## Architecture
//!
//! 1. **Indexing**: fetch every feed and keep links that look like articles
//!    ([`scrapers`], [`triage`])
//! 2. **Extraction**: pull text from each article, interleaving outlets in
//!    rounds and throttling per domain ([`coordinator`], [`extract`],
//!    [`rate_limiter`])
//! 3. **Storage**: write kept articles in idempotent batch transactions
//!    ([`storage`])
//! 4. **Output**: optional JSON run report ([`outputs`])

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod extract;
pub mod models;
pub mod outputs;
pub mod rate_limiter;
pub mod scrapers;
pub mod storage;
pub mod triage;
pub mod utils;
