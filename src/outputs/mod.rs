//! Output generation.
//!
//! # Submodules
//!
//! - [`json`]: Writes a per-run JSON report (counts, kept articles, winning
//!   extractors) when `--json-output-dir` is set
//!
//! Articles themselves go to the database through
//! [`crate::storage::writer`]; nothing here is required for ingestion.

pub mod json;
