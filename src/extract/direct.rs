//! Last-resort strategy: fetch the page ourselves and run the engine on it.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};
use url::Url;

use super::{BlockingPool, ExtractionStrategy, PageContent, engine};
use crate::error::{ExtractError, ExtractResult};

pub const NAME: &str = "direct-http";

pub struct DirectStrategy {
    client: Client,
    pool: BlockingPool,
}

impl DirectStrategy {
    /// `client` should carry the article timeout and user agent.
    pub fn new(client: Client, pool: BlockingPool) -> Self {
        Self { client, pool }
    }
}

#[async_trait]
impl ExtractionStrategy for DirectStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn extract(&self, url: &str) -> ExtractResult<PageContent> {
        let parsed = Url::parse(url)?;
        let response = self.client.get(parsed.clone()).send().await?;
        if response.status() != StatusCode::OK {
            return Err(ExtractError::Status(response.status().as_u16()));
        }

        // Redirects may land on another host; resolve relative links against it.
        let final_url = response.url().clone();
        let html = response.text().await?;
        debug!(bytes = html.len(), %final_url, "Fetched article page");

        self.pool
            .run(move || engine::extract_page(&html, &final_url))
            .await?
    }
}
