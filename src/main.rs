//! # Awful News Ingest
//!
//! Runs one ingestion pass: fetch every configured feed, extract article
//! text through the fallback chain, and write the kept articles to SQLite.
//!
//! ## Usage
//!
//! ```sh
//! awful_news_ingest --feeds config/feeds.yaml --database-url sqlite://news.db
//! ```
//!
//! ## Exit codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Run completed |
//! | 1 | Fatal setup error, or a storage batch failed twice |
//! | 130 | Interrupted by SIGINT (staged articles were committed) |
//!
//! Logs go to stderr so the hidden `extract` subcommand can use stdout for
//! its JSON document.

use awful_news_ingest::cli::{Cli, Command};
use awful_news_ingest::config::{PipelineConfig, filter_sources, load_feed_sources};
use awful_news_ingest::coordinator::{BatchCoordinator, CoordinatorConfig};
use awful_news_ingest::extract::direct::DirectStrategy;
use awful_news_ingest::extract::downloader::DownloaderStrategy;
use awful_news_ingest::extract::subprocess::{ExternalExtraction, SubprocessStrategy};
use awful_news_ingest::extract::{BlockingPool, ContentExtractor, ExtractionStrategy};
use awful_news_ingest::models::ProcessedArticle;
use awful_news_ingest::outputs::json::{ReportArticle, RunReport, write_run_report};
use awful_news_ingest::rate_limiter::DomainRateLimiter;
use awful_news_ingest::scrapers::build_client;
use awful_news_ingest::scrapers::feed::FeedFetcher;
use awful_news_ingest::storage::Store;
use awful_news_ingest::storage::writer::{InsertOutcome, IngestionWriter};
use awful_news_ingest::utils::ensure_writable_dir;
use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Some(Command::Extract {
            url,
            user_agent,
            timeout,
        }) => extract_one(&url, &user_agent, Duration::from_secs(timeout)).await,
        None => match cli.run.into_config() {
            Ok(config) => ingest(config).await,
            Err(e) => Err(e.into()),
        },
    };

    result.unwrap_or_else(|e| {
        error!(error = %e, "Fatal error");
        ExitCode::FAILURE
    })
}

/// The `extract` subcommand: print one article as [`ExternalExtraction`] JSON.
async fn extract_one(url: &str, user_agent: &str, timeout: Duration) -> Result<ExitCode, Box<dyn Error>> {
    let strategy = DirectStrategy::new(build_client(user_agent, timeout)?, BlockingPool::new(1));
    match strategy.extract(url).await {
        Ok(page) => {
            println!("{}", serde_json::to_string(&ExternalExtraction::from(page))?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(%url, error = %e, "Extraction failed");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn ingest(config: PipelineConfig) -> Result<ExitCode, Box<dyn Error>> {
    let start_time = std::time::Instant::now();
    let started_at = Utc::now();
    info!(version = env!("CARGO_PKG_VERSION"), "awful_news_ingest starting up");
    debug!(?config, "Resolved configuration");

    // Early check: ensure the report dir is writable before spending a run on it
    if let Some(dir) = &config.json_output_dir {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "JSON output directory is not writable (fix perms or choose a different path)");
            return Err(e);
        }
    }

    let feeds = filter_sources(load_feed_sources(&config.feeds_file).await?, &config.sources);
    if feeds.is_empty() {
        warn!("No feeds to ingest");
    }

    // Connect before the long fetch phase so a bad DATABASE_URL fails fast.
    let store = if config.dry_run {
        info!("Dry run: articles will not be written");
        None
    } else {
        Some(Store::connect(&config.database_url).await?)
    };
    let writer = store.as_ref().map(|store| Arc::new(IngestionWriter::new(store)));

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone(), writer.clone());

    let coordinator = build_coordinator(&config)?;
    let (articles, stats) = tokio::select! {
        run = coordinator.run_with_stats(&feeds, config.limit_per_feed) => run,
        _ = shutdown.cancelled() => {
            warn!("Interrupted before storage; nothing was written");
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
    };
    info!(kept = articles.len(), dropped = stats.dropped, "Extraction finished");

    let mut inserted = 0;
    let mut failed_batches = 0;
    let mut interrupted = false;
    if let Some(writer) = &writer {
        for chunk in articles.chunks(config.insert_batch_size) {
            match insert_with_retry(writer, chunk).await {
                Some(outcome) => {
                    inserted += outcome.inserted();
                    if outcome.is_interrupted() {
                        interrupted = true;
                        break;
                    }
                }
                None => failed_batches += 1,
            }
            if writer.is_interrupted() {
                interrupted = true;
                break;
            }
        }
        info!(inserted, failed_batches, "Storage finished");
    }
    if let Some(store) = &store {
        log_store_totals(store).await;
    }

    if let Some(dir) = &config.json_output_dir {
        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            dry_run: config.dry_run,
            interrupted,
            stats,
            inserted,
            failed_batches,
            articles: articles.iter().map(ReportArticle::from).collect(),
        };
        if let Err(e) = write_run_report(&report, dir).await {
            error!(error = %e, "Failed to write run report");
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(if interrupted {
        ExitCode::from(EXIT_INTERRUPTED)
    } else if failed_batches > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn build_coordinator(
    config: &PipelineConfig,
) -> Result<BatchCoordinator<FeedFetcher, ContentExtractor>, Box<dyn Error>> {
    let limiter = Arc::new(DomainRateLimiter::new(config.min_delay, config.max_delay));
    let pool = BlockingPool::new(config.extract_workers);

    let fetcher = FeedFetcher::new(
        build_client(&config.user_agent, config.feed_timeout)?,
        Arc::clone(&limiter),
        config.max_retries,
        config.retry_pause,
    );

    let (extractor_program, extractor_args) = config.extractor_command()?;
    let strategies: Vec<Box<dyn ExtractionStrategy>> = vec![
        Box::new(DownloaderStrategy::new(
            &config.downloader,
            &config.user_agent,
            config.article_timeout,
            config.downloader_retries,
            pool.clone(),
        )),
        Box::new(SubprocessStrategy::new(
            extractor_program,
            extractor_args,
            &config.user_agent,
            config.article_timeout,
        )),
        Box::new(DirectStrategy::new(
            build_client(&config.user_agent, config.article_timeout)?,
            pool,
        )),
    ];
    let extractor = ContentExtractor::new(strategies, limiter, config.min_text_length);
    info!(strategies = ?extractor.strategy_names(), "Extraction chain ready");

    Ok(BatchCoordinator::new(
        fetcher,
        extractor,
        CoordinatorConfig {
            batch_size: config.batch_size,
            min_text_length: config.min_text_length,
            round_pause: config.round_pause,
        },
    ))
}

/// SIGINT stops the coordinator and asks the writer for an emergency commit.
fn spawn_signal_handler(shutdown: CancellationToken, writer: Option<Arc<IngestionWriter>>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            return;
        }
        warn!("SIGINT received; shutting down");
        shutdown.cancel();
        if let Some(writer) = writer {
            writer.interrupt();
        }
    });
}

async fn log_store_totals(store: &Store) {
    match tokio::try_join!(store.count_articles(), store.sources()) {
        Ok((articles, sources)) => info!(articles, sources = sources.len(), "Database totals"),
        Err(e) => warn!(error = %e, "Could not read database totals"),
    }
}

/// Insert one chunk, retrying once after a failed (rolled back) transaction.
///
/// Retrying is safe because inserts are idempotent by article id.
async fn insert_with_retry(writer: &IngestionWriter, chunk: &[ProcessedArticle]) -> Option<InsertOutcome> {
    match writer.insert_batch(chunk).await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            warn!(articles = chunk.len(), error = %e, "Batch insert failed; retrying once");
            tokio::time::sleep(Duration::from_secs(1)).await;
            match writer.insert_batch(chunk).await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    error!(articles = chunk.len(), error = %e, "Batch insert failed again; giving up on batch");
                    None
                }
            }
        }
    }
}
