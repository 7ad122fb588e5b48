//! SQLite persistence for sources and articles.
//!
//! Two tables:
//!
//! - `sources`: one row per outlet, keyed by an integer id and unique by name
//! - `articles`: one row per distinct article URL, keyed by the URL fingerprint
//!   (see [`crate::models::article_id`]) and pointing at its source
//!
//! Tables are created with `CREATE TABLE IF NOT EXISTS` when the store
//! connects. Writes go through [`writer::IngestionWriter`].

pub mod writer;

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{info, instrument};

use crate::error::StorageResult;

const CREATE_SOURCES: &str = r#"
CREATE TABLE IF NOT EXISTS sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    feed_url TEXT,
    country TEXT,
    language TEXT,
    created_at TEXT NOT NULL
)
"#;

const CREATE_ARTICLES: &str = r#"
CREATE TABLE IF NOT EXISTS articles (
    id TEXT PRIMARY KEY,
    source_id INTEGER NOT NULL REFERENCES sources(id),
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    text TEXT NOT NULL,
    html TEXT,
    publish_date TEXT,
    authors TEXT NOT NULL DEFAULT '[]',
    language TEXT,
    top_image TEXT,
    scraped_at TEXT NOT NULL,
    extraction_info TEXT NOT NULL,
    processed_at TEXT,
    analysis_status TEXT NOT NULL DEFAULT 'pending'
)
"#;

const CREATE_INDEXES: [&str; 2] = [
    "CREATE INDEX IF NOT EXISTS idx_articles_source_id ON articles(source_id)",
    "CREATE INDEX IF NOT EXISTS idx_articles_analysis_status ON articles(analysis_status)",
];

#[derive(Debug, Clone, FromRow)]
pub struct StoredSource {
    pub id: i64,
    pub name: String,
    pub feed_url: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[derive(Debug, Clone, FromRow)]
pub(crate) struct StoredArticle {
    pub id: String,
    pub source_id: i64,
    pub url: String,
    pub title: String,
    pub text: String,
    pub html: Option<String>,
    pub publish_date: Option<DateTime<Utc>>,
    /// JSON array of author names.
    pub authors: String,
    pub language: Option<String>,
    pub top_image: Option<String>,
    pub scraped_at: DateTime<Utc>,
    /// JSON-encoded [`crate::models::ExtractionInfo`].
    pub extraction_info: String,
    pub processed_at: Option<DateTime<Utc>>,
    pub analysis_status: String,
}

/// Connection pool plus schema bootstrap.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Connect to `database_url` (e.g. `sqlite://news.db`), creating the file
    /// and tables if needed.
    #[instrument(level = "info", skip_all, fields(%database_url))]
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        info!("Database ready");
        Ok(store)
    }

    async fn ensure_schema(&self) -> StorageResult<()> {
        sqlx::query(CREATE_SOURCES).execute(&self.pool).await?;
        sqlx::query(CREATE_ARTICLES).execute(&self.pool).await?;
        for index in CREATE_INDEXES {
            sqlx::query(index).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn count_articles(&self) -> StorageResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    #[cfg(test)]
    pub(crate) async fn article(&self, id: &str) -> StorageResult<Option<StoredArticle>> {
        let article = sqlx::query_as::<_, StoredArticle>("SELECT * FROM articles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(article)
    }

    pub async fn sources(&self) -> StorageResult<Vec<StoredSource>> {
        let sources = sqlx::query_as::<_, StoredSource>("SELECT * FROM sources ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(sources)
    }
}

#[cfg(test)]
pub(crate) async fn temp_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("news.db").display());
    let store = Store::connect(&url).await.unwrap();
    (dir, store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_creates_empty_schema() {
        let (_dir, store) = temp_store().await;
        assert_eq!(store.count_articles().await.unwrap(), 0);
        assert!(store.sources().await.unwrap().is_empty());
        assert!(store.article("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_schema_bootstrap_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("news.db").display());
        let first = Store::connect(&url).await.unwrap();
        sqlx::query("INSERT INTO sources (name, created_at) VALUES ('Site', '2024-05-01T00:00:00Z')")
            .execute(first.pool())
            .await
            .unwrap();
        drop(first);

        let second = Store::connect(&url).await.unwrap();
        assert_eq!(second.sources().await.unwrap().len(), 1);
    }
}
