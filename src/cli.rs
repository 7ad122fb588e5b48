//! Command-line interface definitions for Awful News Ingest.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Every run option can be provided via a command-line flag or an
//! environment variable.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{DEFAULT_USER_AGENT, PipelineConfig, seconds};
use crate::error::ConfigError;

/// Command-line arguments for the Awful News Ingest application.
///
/// With no subcommand the binary runs one ingestion pass over the feed list.
///
/// # Examples
///
/// ```sh
/// # Ingest every feed in config/feeds.yaml into news.db
/// awful_news_ingest
///
/// # Two outlets only, no database writes, with a run report
/// awful_news_ingest --source "Example World" --source "Other Outlet" --dry-run -j ./reports
///
/// # Use a different secondary extractor
/// awful_news_ingest --extractor-cmd python3 --extractor-arg tools/extract.py
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about, args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract one article and print it as JSON (used as the secondary extractor)
    #[command(hide = true)]
    Extract {
        url: String,

        #[arg(long, env = "USER_AGENT", default_value = DEFAULT_USER_AGENT)]
        user_agent: String,

        /// HTTP timeout in seconds
        #[arg(long, env = "ARTICLE_TIMEOUT", default_value_t = 30)]
        timeout: u64,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// YAML file listing the feeds to ingest
    #[arg(long, env = "FEEDS_FILE", default_value = "config/feeds.yaml")]
    pub feeds: PathBuf,

    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://news.db")]
    pub database_url: String,

    /// Per-feed HTTP timeout in seconds
    #[arg(long, env = "FEED_TIMEOUT", default_value_t = 30)]
    pub feed_timeout: u64,

    /// Per-article extraction timeout in seconds
    #[arg(long, env = "ARTICLE_TIMEOUT", default_value_t = 30)]
    pub article_timeout: u64,

    /// Feeds fetched concurrently per group
    #[arg(long, env = "BATCH_SIZE", default_value_t = 5)]
    pub batch_size: usize,

    /// Minimum seconds between requests to the same domain
    #[arg(long, env = "MIN_DELAY", default_value_t = 1.0)]
    pub min_delay: f64,

    /// Maximum seconds between requests to the same domain
    #[arg(long, env = "MAX_DELAY", default_value_t = 3.0)]
    pub max_delay: f64,

    /// Articles taken from each feed per run
    #[arg(long, env = "LIMIT_PER_FEED", default_value_t = 10)]
    pub limit_per_feed: usize,

    /// User agent sent with every request
    #[arg(long, env = "USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Retries for a feed fetch that timed out
    #[arg(long, env = "MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Extracted text must be longer than this many characters
    #[arg(long, env = "MIN_TEXT_LENGTH", default_value_t = 100)]
    pub min_text_length: usize,

    /// Seconds to pause between extraction rounds
    #[arg(long, env = "ROUND_PAUSE", default_value_t = 1.0)]
    pub round_pause: f64,

    /// Blocking workers for HTML parsing
    #[arg(long, env = "EXTRACT_WORKERS", default_value_t = 4)]
    pub extract_workers: usize,

    /// Downloader executable for the primary extraction strategy
    #[arg(long, env = "DOWNLOADER_BIN", default_value = "curl")]
    pub downloader: String,

    /// Program for the secondary extractor (defaults to this binary's `extract`)
    #[arg(long, env = "EXTRACTOR_CMD")]
    pub extractor_cmd: Option<String>,

    /// Argument passed to --extractor-cmd ahead of the article URL
    /// (repeatable, one argument per flag, kept verbatim)
    #[arg(long = "extractor-arg", requires = "extractor_cmd", allow_hyphen_values = true)]
    pub extractor_args: Vec<String>,

    /// Articles per database transaction
    #[arg(long, env = "INSERT_BATCH_SIZE", default_value_t = 100)]
    pub insert_batch_size: usize,

    /// Only ingest these sources (repeatable)
    #[arg(long = "source")]
    pub sources: Vec<String>,

    /// Output directory for the JSON run report
    #[arg(short, long, env = "JSON_OUTPUT_DIR")]
    pub json_output_dir: Option<String>,

    /// Fetch and extract but do not write to the database
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    /// Validate and convert into a [`PipelineConfig`].
    pub fn into_config(self) -> Result<PipelineConfig, ConfigError> {
        let config = PipelineConfig {
            feeds_file: self.feeds,
            database_url: self.database_url,
            feed_timeout: std::time::Duration::from_secs(self.feed_timeout),
            article_timeout: std::time::Duration::from_secs(self.article_timeout),
            batch_size: self.batch_size,
            min_delay: seconds("min-delay", self.min_delay)?,
            max_delay: seconds("max-delay", self.max_delay)?,
            limit_per_feed: self.limit_per_feed,
            user_agent: self.user_agent,
            max_retries: self.max_retries,
            min_text_length: self.min_text_length,
            round_pause: seconds("round-pause", self.round_pause)?,
            extract_workers: self.extract_workers,
            downloader: self.downloader,
            extractor_cmd: self
                .extractor_cmd
                .map(|program| std::iter::once(program).chain(self.extractor_args).collect()),
            insert_batch_size: self.insert_batch_size,
            sources: self.sources,
            json_output_dir: self.json_output_dir,
            dry_run: self.dry_run,
            ..PipelineConfig::default()
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["awful_news_ingest"]);
        assert!(cli.command.is_none());

        let config = cli.run.into_config().unwrap();
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.limit_per_feed, 10);
        assert_eq!(config.min_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(3));
        assert_eq!(config.min_text_length, 100);
        assert_eq!(config.downloader, "curl");
        assert!(config.extractor_cmd.is_none());
        assert!(!config.dry_run);
    }

    #[test]
    fn test_cli_run_flags() {
        let cli = Cli::parse_from([
            "awful_news_ingest",
            "--feeds",
            "/tmp/feeds.yaml",
            "--batch-size",
            "2",
            "--round-pause",
            "0.5",
            "--source",
            "Alpha",
            "--source",
            "Beta",
            "--extractor-cmd",
            "python3",
            "--extractor-arg",
            "extract.py",
            "-j",
            "/tmp/reports",
            "--dry-run",
        ]);
        let config = cli.run.into_config().unwrap();

        assert_eq!(config.feeds_file, PathBuf::from("/tmp/feeds.yaml"));
        assert_eq!(config.batch_size, 2);
        assert_eq!(config.round_pause, Duration::from_millis(500));
        assert_eq!(config.sources, vec!["Alpha", "Beta"]);
        assert_eq!(
            config.extractor_cmd,
            Some(vec!["python3".to_string(), "extract.py".to_string()])
        );
        assert_eq!(config.json_output_dir.as_deref(), Some("/tmp/reports"));
        assert!(config.dry_run);
    }

    #[test]
    fn test_cli_extractor_args_are_kept_verbatim() {
        let cli = Cli::parse_from([
            "awful_news_ingest",
            "--extractor-cmd",
            "/opt/My Tools/extract",
            "--extractor-arg",
            "--profile",
            "--extractor-arg",
            "news sites.toml",
        ]);
        let config = cli.run.into_config().unwrap();
        let (program, args) = config.extractor_command().unwrap();
        assert_eq!(program, "/opt/My Tools/extract");
        assert_eq!(args, vec!["--profile", "news sites.toml"]);
    }

    #[test]
    fn test_cli_extractor_arg_requires_command() {
        let result = Cli::try_parse_from(["awful_news_ingest", "--extractor-arg", "x.py"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_extract_subcommand() {
        let cli = Cli::parse_from([
            "awful_news_ingest",
            "extract",
            "https://site.com/a/b",
            "--timeout",
            "5",
        ]);
        match cli.command {
            Some(Command::Extract { url, timeout, .. }) => {
                assert_eq!(url, "https://site.com/a/b");
                assert_eq!(timeout, 5);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_invalid_values() {
        let cli = Cli::parse_from(["awful_news_ingest", "--min-delay", "4", "--max-delay", "2"]);
        assert!(cli.run.into_config().is_err());
    }
}
