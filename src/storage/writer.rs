//! Transactional, idempotent article writer.
//!
//! A batch is written inside one transaction: every article is either
//! skipped (empty text, already stored) or staged, and the whole batch
//! commits once. A failure anywhere rolls the batch back.
//!
//! Interruption is cooperative. [`IngestionWriter::interrupt`] cancels the
//! writer's token; [`IngestionWriter::insert_batch`] notices between articles
//! and commits what it has already staged (an *emergency commit*) instead of
//! losing it. No transaction outlives the call either way.
//!
//! ```text
//! begin ─▶ stage ─▶ stage ─▶ ... ─▶ commit
//!                     │
//!                 interrupted ─▶ emergency_commit (rollback if that fails)
//! ```

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::Store;
use crate::error::{StorageError, StorageResult};
use crate::models::ProcessedArticle;

/// How an [`IngestionWriter::insert_batch`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Completed { inserted: usize },
    /// Stopped early; the articles staged before the interrupt were committed.
    Interrupted { inserted: usize },
}

impl InsertOutcome {
    pub fn inserted(&self) -> usize {
        match self {
            Self::Completed { inserted } | Self::Interrupted { inserted } => *inserted,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }
}

/// What [`BatchSession::stage`] did with one article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Staged,
    SkippedEmpty,
    SkippedDuplicate,
}

pub struct IngestionWriter {
    pool: SqlitePool,
    in_flight: Mutex<()>,
    cancel: CancellationToken,
}

impl IngestionWriter {
    pub fn new(store: &Store) -> Self {
        Self {
            pool: store.pool().clone(),
            in_flight: Mutex::new(()),
            cancel: CancellationToken::new(),
        }
    }

    /// Ask the writer to stop at the next article boundary.
    pub fn interrupt(&self) {
        self.cancel.cancel();
    }

    pub fn is_interrupted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Open a batch transaction. Waits while another batch is in flight.
    pub async fn begin(&self) -> StorageResult<BatchSession<'_>> {
        let guard = self.in_flight.lock().await;
        let tx = self.pool.begin().await?;
        Ok(BatchSession {
            tx,
            _guard: guard,
            sources: HashMap::new(),
            staged: 0,
        })
    }

    /// Write `articles` in one transaction.
    ///
    /// Returns how many rows were inserted. On error nothing from this batch
    /// is persisted.
    #[instrument(level = "info", skip_all, fields(articles = articles.len()))]
    pub async fn insert_batch(&self, articles: &[ProcessedArticle]) -> StorageResult<InsertOutcome> {
        self.insert_batch_with(articles, |_| {}).await
    }

    /// [`Self::insert_batch`], calling `on_staged` with the running count
    /// after each staged article.
    async fn insert_batch_with<F>(&self, articles: &[ProcessedArticle], mut on_staged: F) -> StorageResult<InsertOutcome>
    where
        F: FnMut(usize),
    {
        let mut session = self.begin().await?;
        let mut skipped = 0usize;

        for article in articles {
            if self.is_interrupted() {
                warn!(staged = session.staged(), "Interrupted mid-batch; committing staged articles");
                let inserted = session.emergency_commit().await?;
                return Ok(InsertOutcome::Interrupted { inserted });
            }

            match session.stage(article).await {
                Ok(StageOutcome::Staged) => on_staged(session.staged()),
                Ok(_) => skipped += 1,
                Err(e) => {
                    error!(url = %article.url(), error = %e, "Failed to stage article; rolling back batch");
                    if let Err(rollback_err) = session.rollback().await {
                        error!(error = %rollback_err, "Rollback failed");
                    }
                    return Err(e);
                }
            }
        }

        let inserted = session.commit().await?;
        info!(inserted, skipped, "Batch committed");
        Ok(InsertOutcome::Completed { inserted })
    }
}

/// One open batch transaction. Holds the writer's in-flight lock until it is
/// committed, rolled back or dropped (dropping rolls back).
pub struct BatchSession<'w> {
    tx: Transaction<'static, Sqlite>,
    _guard: MutexGuard<'w, ()>,
    /// Source name -> id, valid for this transaction only.
    sources: HashMap<String, i64>,
    staged: usize,
}

impl BatchSession<'_> {
    pub fn staged(&self) -> usize {
        self.staged
    }

    /// Stage one article unless it has no text or is already stored.
    ///
    /// The existence check runs inside the transaction, so a URL repeated
    /// within one batch is only staged once.
    pub async fn stage(&mut self, article: &ProcessedArticle) -> StorageResult<StageOutcome> {
        let text = match article.text.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => {
                debug!(url = %article.url(), "Skipping article without text");
                return Ok(StageOutcome::SkippedEmpty);
            }
        };

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM articles WHERE id = ?")
            .bind(article.id())
            .fetch_optional(&mut *self.tx)
            .await?;
        if exists.is_some() {
            debug!(url = %article.url(), "Article already stored");
            return Ok(StageOutcome::SkippedDuplicate);
        }

        let source_id = self.source_id(article).await?;
        let authors = serde_json::to_string(&article.authors).map_err(|source| StorageError::Encode {
            column: "authors",
            source,
        })?;
        let extraction_info =
            serde_json::to_string(&article.extraction_info).map_err(|source| StorageError::Encode {
                column: "extraction_info",
                source,
            })?;

        sqlx::query(
            r#"
            INSERT INTO articles (
                id, source_id, url, title, text, html, publish_date, authors,
                language, top_image, scraped_at, extraction_info, processed_at, analysis_status
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, 'pending')
            "#,
        )
        .bind(article.id())
        .bind(source_id)
        .bind(article.url())
        .bind(article.best_title())
        .bind(text)
        .bind(article.html.as_deref())
        .bind(article.candidate.publish_date)
        .bind(authors)
        .bind(article.candidate.language.as_deref())
        .bind(article.top_image.as_deref())
        .bind(article.scraped_at)
        .bind(extraction_info)
        .execute(&mut *self.tx)
        .await?;

        self.staged += 1;
        Ok(StageOutcome::Staged)
    }

    /// Resolve the article's source by name, creating it on first sight.
    async fn source_id(&mut self, article: &ProcessedArticle) -> StorageResult<i64> {
        let candidate = &article.candidate;
        if let Some(id) = self.sources.get(&candidate.source_name) {
            return Ok(*id);
        }

        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM sources WHERE name = ?")
            .bind(&candidate.source_name)
            .fetch_optional(&mut *self.tx)
            .await?;

        let id = match existing {
            Some(id) => id,
            None => {
                let result = sqlx::query(
                    "INSERT INTO sources (name, feed_url, country, language, created_at) VALUES (?, ?, ?, ?, ?)",
                )
                .bind(&candidate.source_name)
                .bind(&candidate.feed_url)
                .bind(candidate.country.as_deref())
                .bind(candidate.language.as_deref())
                .bind(Utc::now())
                .execute(&mut *self.tx)
                .await?;
                info!(source = %candidate.source_name, "Registered new source");
                result.last_insert_rowid()
            }
        };

        self.sources.insert(candidate.source_name.clone(), id);
        Ok(id)
    }

    pub async fn commit(self) -> StorageResult<usize> {
        let staged = self.staged;
        self.tx.commit().await?;
        Ok(staged)
    }

    /// Commit whatever is staged after an interrupt.
    ///
    /// If the commit itself fails the transaction is rolled back and the
    /// error returned.
    pub async fn emergency_commit(self) -> StorageResult<usize> {
        let staged = self.staged;
        match self.tx.commit().await {
            Ok(()) => {
                warn!(committed = staged, "Emergency commit succeeded");
                Ok(staged)
            }
            Err(e) => {
                // The failed transaction rolls back when dropped.
                error!(error = %e, staged, "Emergency commit failed; batch rolled back");
                Err(e.into())
            }
        }
    }

    pub async fn rollback(self) -> StorageResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidateArticle, ExtractionInfo, FeedSource};
    use crate::storage::temp_store;

    fn article(source: &str, path: &str, text: Option<&str>) -> ProcessedArticle {
        let feed = FeedSource::new(format!("https://{source}.com/rss.xml"), source);
        ProcessedArticle {
            candidate: CandidateArticle::new(
                &feed,
                format!("https://{source}.com/news/{path}"),
                format!("Title {path}"),
                None,
            ),
            text: text.map(str::to_string),
            html: None,
            authors: vec!["Jane Doe".to_string()],
            top_image: None,
            extraction_info: ExtractionInfo {
                extractor_name: "direct-http".to_string(),
                success: true,
                ..Default::default()
            },
            scraped_at: Utc::now(),
        }
    }

    fn batch(n: usize) -> Vec<ProcessedArticle> {
        (0..n)
            .map(|i| article("site", &format!("story-{i}"), Some("Body text")))
            .collect()
    }

    #[tokio::test]
    async fn test_insert_batch_is_idempotent() {
        let (_dir, store) = temp_store().await;
        let writer = IngestionWriter::new(&store);
        let articles = batch(3);

        let first = writer.insert_batch(&articles).await.unwrap();
        let second = writer.insert_batch(&articles).await.unwrap();

        assert_eq!(first, InsertOutcome::Completed { inserted: 3 });
        assert_eq!(second, InsertOutcome::Completed { inserted: 0 });
        assert_eq!(store.count_articles().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_duplicates_within_one_batch_are_skipped() {
        let (_dir, store) = temp_store().await;
        let writer = IngestionWriter::new(&store);
        let a = article("site", "story", Some("Body"));

        let outcome = writer.insert_batch(&[a.clone(), a]).await.unwrap();
        assert_eq!(outcome.inserted(), 1);
        assert_eq!(store.count_articles().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_text_is_skipped() {
        let (_dir, store) = temp_store().await;
        let writer = IngestionWriter::new(&store);
        let articles = vec![
            article("site", "none", None),
            article("site", "blank", Some("   ")),
            article("site", "full", Some("Body")),
        ];

        assert_eq!(writer.insert_batch(&articles).await.unwrap().inserted(), 1);
    }

    #[tokio::test]
    async fn test_sources_are_resolved_by_name() {
        let (_dir, store) = temp_store().await;
        let writer = IngestionWriter::new(&store);

        writer
            .insert_batch(&[article("alpha", "a", Some("x")), article("alpha", "b", Some("x"))])
            .await
            .unwrap();
        writer
            .insert_batch(&[article("alpha", "c", Some("x")), article("beta", "d", Some("x"))])
            .await
            .unwrap();

        let sources = store.sources().await.unwrap();
        let names: Vec<_> = sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);

        let stored = store
            .article(&article("alpha", "c", None).candidate.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.source_id, sources[0].id);
        assert_eq!(stored.title, "Title c");
        assert_eq!(stored.authors, r#"["Jane Doe"]"#);
        assert_eq!(stored.analysis_status, "pending");
        assert!(stored.processed_at.is_none());
        let info: ExtractionInfo = serde_json::from_str(&stored.extraction_info).unwrap();
        assert_eq!(info.extractor_name, "direct-http");
    }

    #[tokio::test]
    async fn test_emergency_commit_keeps_staged_and_rerun_completes() {
        let (_dir, store) = temp_store().await;
        let writer = IngestionWriter::new(&store);
        let articles = batch(5);

        let mut session = writer.begin().await.unwrap();
        for a in &articles[..2] {
            assert_eq!(session.stage(a).await.unwrap(), StageOutcome::Staged);
        }
        assert_eq!(session.emergency_commit().await.unwrap(), 2);
        assert_eq!(store.count_articles().await.unwrap(), 2);

        let rerun = writer.insert_batch(&articles).await.unwrap();
        assert_eq!(rerun.inserted(), 3);
        assert_eq!(store.count_articles().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_interrupted_writer_commits_and_reports() {
        let (_dir, store) = temp_store().await;
        let writer = IngestionWriter::new(&store);
        writer.interrupt();

        let outcome = writer.insert_batch(&batch(3)).await.unwrap();
        assert!(outcome.is_interrupted());
        assert_eq!(outcome.inserted(), 0);

        // The transaction was closed: the lock and the database are free again.
        let session = writer.begin().await.unwrap();
        session.rollback().await.unwrap();
        assert_eq!(store.count_articles().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_interrupt_mid_batch_commits_staged_prefix() {
        let (_dir, store) = temp_store().await;
        let writer = IngestionWriter::new(&store);
        let articles = batch(5);

        let outcome = writer
            .insert_batch_with(&articles, |staged| {
                if staged == 2 {
                    writer.interrupt();
                }
            })
            .await
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Interrupted { inserted: 2 });
        assert_eq!(store.count_articles().await.unwrap(), 2);

        // A fresh writer (the next run) picks up exactly the remainder.
        let rerun = IngestionWriter::new(&store).insert_batch(&articles).await.unwrap();
        assert_eq!(rerun, InsertOutcome::Completed { inserted: 3 });
        assert_eq!(store.count_articles().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_rollback_discards_staged_articles() {
        let (_dir, store) = temp_store().await;
        let writer = IngestionWriter::new(&store);

        let mut session = writer.begin().await.unwrap();
        for a in &batch(2) {
            session.stage(a).await.unwrap();
        }
        session.rollback().await.unwrap();

        assert_eq!(store.count_articles().await.unwrap(), 0);
        assert!(store.sources().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_rolls_back_whole_batch() {
        let (_dir, store) = temp_store().await;
        sqlx::query(
            "CREATE TRIGGER reject_poison BEFORE INSERT ON articles \
             WHEN NEW.url LIKE '%poison%' BEGIN SELECT RAISE(ABORT, 'poisoned'); END",
        )
        .execute(store.pool())
        .await
        .unwrap();
        let writer = IngestionWriter::new(&store);

        let articles = vec![
            article("site", "fine", Some("Body")),
            article("site", "poison", Some("Body")),
        ];
        assert!(writer.insert_batch(&articles).await.is_err());
        assert_eq!(store.count_articles().await.unwrap(), 0);
        assert!(store.sources().await.unwrap().is_empty());

        // The writer stays usable after a failed batch.
        let ok = writer.insert_batch(&articles[..1]).await.unwrap();
        assert_eq!(ok.inserted(), 1);
    }
}
