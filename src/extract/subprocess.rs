//! Secondary strategy: run an external extractor process and read JSON from
//! its stdout.
//!
//! By default the process is this binary's own `extract` subcommand, which
//! prints an [`ExternalExtraction`]. Any program that prints the same shape
//! can be plugged in with `--extractor-cmd`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{ExtractionStrategy, PageContent};
use crate::error::{ExtractError, ExtractResult};
use crate::utils::{normalize_text, truncate_for_log};

pub const NAME: &str = "readability-subprocess";

/// JSON document exchanged with an external extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalExtraction {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, alias = "raw_text")]
    pub text: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
}

impl From<PageContent> for ExternalExtraction {
    fn from(page: PageContent) -> Self {
        Self {
            title: page.title,
            author: (!page.authors.is_empty()).then(|| page.authors.join(", ")),
            date: page.date,
            language: page.language,
            image: page.top_image,
            text: Some(page.text),
            html: page.html,
        }
    }
}

impl From<ExternalExtraction> for PageContent {
    fn from(ext: ExternalExtraction) -> Self {
        Self {
            title: ext.title.filter(|t| !t.trim().is_empty()),
            authors: ext
                .author
                .map(|a| {
                    a.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            date: ext.date,
            language: ext.language,
            top_image: ext.image,
            text: ext.text.as_deref().map(normalize_text).unwrap_or_default(),
            html: ext.html,
        }
    }
}

pub struct SubprocessStrategy {
    program: String,
    args: Vec<String>,
    user_agent: String,
    timeout: Duration,
}

impl SubprocessStrategy {
    /// The article URL is appended after `args`.
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        user_agent: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            user_agent: user_agent.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ExtractionStrategy for SubprocessStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    #[instrument(level = "debug", skip_all, fields(%url, program = %self.program))]
    async fn extract(&self, url: &str) -> ExtractResult<PageContent> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(url)
            .env("USER_AGENT", &self.user_agent)
            .env("ARTICLE_TIMEOUT", self.timeout.as_secs().max(1).to_string())
            // Keep the child's own logging out of our way.
            .env("RUST_LOG", "warn")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ExtractError::Timeout(self.timeout))?
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => ExtractError::ToolMissing {
                    program: self.program.clone(),
                },
                _ => ExtractError::Io(e),
            })?;

        if !output.status.success() {
            return Err(ExtractError::ProcessFailed {
                program: self.program.clone(),
                code: output.status.code(),
                stderr: truncate_for_log(String::from_utf8_lossy(&output.stderr).trim(), 300),
            });
        }

        debug!(bytes = output.stdout.len(), "Extractor process finished");
        let external: ExternalExtraction = serde_json::from_slice(&output.stdout)?;
        let page = PageContent::from(external);
        if page.text.is_empty() {
            return Err(ExtractError::NoContent);
        }
        Ok(page)
    }
}
