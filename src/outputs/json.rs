//! JSON run report.
//!
//! One file per run summarising what the coordinator and writer did, for
//! dashboards or cron mail.
//!
//! # Output Structure
//!
//! Files are organized by UTC date, named by the run's start time:
//! ```text
//! json_output_dir/
//! └── 2025-05-06/
//!     ├── 060000.json
//!     └── 180000.json
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

use crate::coordinator::RunStats;
use crate::models::ProcessedArticle;

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub interrupted: bool,
    pub stats: RunStats,
    /// Rows actually written; zero on a dry run.
    pub inserted: usize,
    pub failed_batches: usize,
    pub articles: Vec<ReportArticle>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportArticle {
    pub id: String,
    pub url: String,
    pub title: String,
    pub source: String,
    pub extractor: String,
    pub text_length: usize,
}

impl From<&ProcessedArticle> for ReportArticle {
    fn from(article: &ProcessedArticle) -> Self {
        Self {
            id: article.id().to_string(),
            url: article.url().to_string(),
            title: article.best_title().to_string(),
            source: article.candidate.source_name.clone(),
            extractor: article.extraction_info.extractor_name.clone(),
            text_length: article.text_len(),
        }
    }
}

/// Write `report` under `json_output_dir` and return the file path.
///
/// The file is written to: `{json_output_dir}/{date}/{HHMMSS}.json`
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_run_report(
    report: &RunReport,
    json_output_dir: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(report)?;

    let full_json_dir = PathBuf::from(json_output_dir).join(report.started_at.format("%Y-%m-%d").to_string());
    info!(full_json_dir = %full_json_dir.display(), "Ensuring JSON directory exists");
    if let Err(e) = fs::create_dir_all(&full_json_dir).await {
        error!(full_json_dir = %full_json_dir.display(), error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = full_json_dir.join(format!("{}.json", report.started_at.format("%H%M%S")));
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote run report");
    Ok(path)
}
