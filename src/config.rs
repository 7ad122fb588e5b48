//! Run configuration and the feed list.
//!
//! [`PipelineConfig`] is the validated, typed form of the command line
//! (see [`crate::cli::RunArgs`]). The feed list lives in a YAML file, either
//! as a bare list or under a `feeds:` key:
//!
//! ```yaml
//! feeds:
//!   - url: https://feeds.example.com/world.xml
//!     source_name: Example World
//!     country: us
//!     language: en
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::error::ConfigError;
use crate::models::FeedSource;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub feeds_file: PathBuf,
    pub database_url: String,
    pub feed_timeout: Duration,
    pub article_timeout: Duration,
    pub batch_size: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub limit_per_feed: usize,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_pause: Duration,
    pub min_text_length: usize,
    pub round_pause: Duration,
    pub extract_workers: usize,
    pub downloader: String,
    /// `--retry` passed to the downloader.
    pub downloader_retries: u32,
    /// Program and leading arguments of the secondary extractor. `None` runs
    /// this binary's `extract` subcommand.
    pub extractor_cmd: Option<Vec<String>>,
    pub insert_batch_size: usize,
    /// Source names to restrict the run to; empty means every feed.
    pub sources: Vec<String>,
    pub json_output_dir: Option<String>,
    pub dry_run: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            feeds_file: PathBuf::from("config/feeds.yaml"),
            database_url: "sqlite://news.db".to_string(),
            feed_timeout: Duration::from_secs(30),
            article_timeout: Duration::from_secs(30),
            batch_size: 5,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(3),
            limit_per_feed: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_retries: 3,
            retry_pause: Duration::from_secs(2),
            min_text_length: 100,
            round_pause: Duration::from_secs(1),
            extract_workers: 4,
            downloader: "curl".to_string(),
            downloader_retries: 2,
            extractor_cmd: None,
            insert_batch_size: 100,
            sources: Vec::new(),
            json_output_dir: None,
            dry_run: false,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("batch-size", self.batch_size),
            ("limit-per-feed", self.limit_per_feed),
            ("extract-workers", self.extract_workers),
            ("insert-batch-size", self.insert_batch_size),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::Invalid(format!("--{name} must be at least 1")));
        }
        if self.feed_timeout.is_zero() || self.article_timeout.is_zero() {
            return Err(ConfigError::Invalid("timeouts must be non-zero".to_string()));
        }
        if self.min_delay > self.max_delay {
            return Err(ConfigError::Invalid(format!(
                "--min-delay ({:?}) exceeds --max-delay ({:?})",
                self.min_delay, self.max_delay
            )));
        }
        if matches!(&self.extractor_cmd, Some(cmd) if cmd.is_empty()) {
            return Err(ConfigError::Invalid("--extractor-cmd is empty".to_string()));
        }
        Ok(())
    }

    /// Program and arguments for the secondary extractor process.
    pub fn extractor_command(&self) -> Result<(String, Vec<String>), ConfigError> {
        match &self.extractor_cmd {
            Some(parts) => {
                let (program, args) = parts
                    .split_first()
                    .ok_or_else(|| ConfigError::Invalid("--extractor-cmd is empty".to_string()))?;
                Ok((program.clone(), args.to_vec()))
            }
            None => {
                let exe = std::env::current_exe().map_err(|source| ConfigError::Read {
                    path: "current executable".to_string(),
                    source,
                })?;
                Ok((exe.display().to_string(), vec!["extract".to_string()]))
            }
        }
    }
}

/// Seconds from the command line to a `Duration`.
pub fn seconds(name: &str, secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| ConfigError::Invalid(format!("--{name} must be a non-negative number of seconds")))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FeedFile {
    List(Vec<FeedSource>),
    Keyed { feeds: Vec<FeedSource> },
}

/// Parse a feed list from YAML text.
pub fn parse_feed_sources(yaml: &str, path: &str) -> Result<Vec<FeedSource>, ConfigError> {
    let file: FeedFile = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })?;
    let feeds = match file {
        FeedFile::List(feeds) | FeedFile::Keyed { feeds } => feeds,
    };
    if let Some(bad) = feeds
        .iter()
        .find(|f| f.feed_url.trim().is_empty() || f.source_name.trim().is_empty())
    {
        return Err(ConfigError::Invalid(format!(
            "{path}: feed entries need both a url and a source_name (got {bad:?})"
        )));
    }
    Ok(feeds)
}

/// Load the feed list from `path`.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_feed_sources(path: &Path) -> Result<Vec<FeedSource>, ConfigError> {
    let display = path.display().to_string();
    let yaml = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
    let feeds = parse_feed_sources(&yaml, &display)?;
    info!(count = feeds.len(), "Loaded feed sources");
    Ok(feeds)
}

/// Keep the feeds whose `source_name` matches one of `names`
/// (case-insensitive). An empty `names` keeps everything.
pub fn filter_sources(feeds: Vec<FeedSource>, names: &[String]) -> Vec<FeedSource> {
    if names.is_empty() {
        return feeds;
    }
    for name in names {
        if !feeds.iter().any(|f| f.source_name.eq_ignore_ascii_case(name)) {
            warn!(source = %name, "Requested source is not in the feed list");
        }
    }
    feeds
        .into_iter()
        .filter(|f| names.iter().any(|n| f.source_name.eq_ignore_ascii_case(n)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let config = PipelineConfig {
            batch_size: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("--batch-size"), "{err}");
    }

    #[test]
    fn test_validate_rejects_inverted_delays() {
        let config = PipelineConfig {
            min_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(1),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_seconds_rejects_negative() {
        assert_eq!(seconds("round-pause", 1.5).unwrap(), Duration::from_millis(1500));
        assert!(seconds("round-pause", -1.0).is_err());
        assert!(seconds("round-pause", f64::NAN).is_err());
    }

    #[test]
    fn test_extractor_command_override() {
        let config = PipelineConfig {
            extractor_cmd: Some(vec!["python3".to_string(), "extract.py".to_string()]),
            ..Default::default()
        };
        let (program, args) = config.extractor_command().unwrap();
        assert_eq!(program, "python3");
        assert_eq!(args, vec!["extract.py"]);
    }

    #[test]
    fn test_extractor_command_defaults_to_self() {
        let (_, args) = PipelineConfig::default().extractor_command().unwrap();
        assert_eq!(args, vec!["extract"]);
    }

    #[test]
    fn test_parse_feed_sources_both_shapes() {
        let list = "- url: https://a.com/rss.xml\n  source_name: A\n";
        let keyed = "feeds:\n  - feed_url: https://b.com/atom.xml\n    source_name: B\n    language: de\n";

        let a = parse_feed_sources(list, "list.yaml").unwrap();
        let b = parse_feed_sources(keyed, "keyed.yaml").unwrap();
        assert_eq!(a[0].feed_url, "https://a.com/rss.xml");
        assert_eq!(b[0].source_name, "B");
        assert_eq!(b[0].language.as_deref(), Some("de"));
    }

    #[test]
    fn test_parse_feed_sources_rejects_blank_entries() {
        let yaml = "- url: ''\n  source_name: A\n";
        assert!(matches!(
            parse_feed_sources(yaml, "f.yaml"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            parse_feed_sources("not: [valid", "f.yaml"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_feed_sources_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feeds.yaml");
        std::fs::write(&path, "- url: https://a.com/rss.xml\n  source_name: A\n").unwrap();
        assert_eq!(load_feed_sources(&path).await.unwrap().len(), 1);

        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            load_feed_sources(&missing).await,
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_filter_sources_is_case_insensitive() {
        let feeds = vec![
            FeedSource::new("https://a.com/rss.xml", "Alpha"),
            FeedSource::new("https://b.com/rss.xml", "Beta"),
        ];
        let kept = filter_sources(feeds.clone(), &["alpha".to_string(), "gamma".to_string()]);
        assert_eq!(kept, vec![feeds[0].clone()]);
        assert_eq!(filter_sources(feeds.clone(), &[]), feeds);
    }
}
