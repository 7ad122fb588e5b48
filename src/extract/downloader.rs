//! Primary strategy: an external downloader writes the page to a temp file,
//! then the in-process engine extracts it.
//!
//! The downloader defaults to `curl` and is given its own `--max-time` and
//! `--retry` so slow hosts are bounded outside this process too.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, instrument};
use url::Url;

use super::{BlockingPool, ExtractionStrategy, PageContent, engine};
use crate::error::{ExtractError, ExtractResult};
use crate::utils::truncate_for_log;

pub const NAME: &str = "downloader+readability";

pub struct DownloaderStrategy {
    program: String,
    user_agent: String,
    timeout: Duration,
    retries: u32,
    pool: BlockingPool,
}

impl DownloaderStrategy {
    pub fn new(
        program: impl Into<String>,
        user_agent: impl Into<String>,
        timeout: Duration,
        retries: u32,
        pool: BlockingPool,
    ) -> Self {
        Self {
            program: program.into(),
            user_agent: user_agent.into(),
            timeout,
            retries,
            pool,
        }
    }

    /// Upper bound on the whole downloader run, retries included.
    fn deadline(&self) -> Duration {
        self.timeout * (self.retries + 1) + Duration::from_secs(5)
    }

    async fn download(&self, url: &str, dest: &NamedTempFile) -> ExtractResult<()> {
        let mut command = Command::new(&self.program);
        command
            .args(["--silent", "--show-error", "--location", "--fail", "--compressed"])
            .arg("--max-time")
            .arg(self.timeout.as_secs().max(1).to_string())
            .arg("--retry")
            .arg(self.retries.to_string())
            .arg("--user-agent")
            .arg(&self.user_agent)
            .arg("--output")
            .arg(dest.path())
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.deadline(), command.output())
            .await
            .map_err(|_| ExtractError::Timeout(self.deadline()))?
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
        Ok(())
    }
}

#[async_trait]
impl ExtractionStrategy for DownloaderStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    #[instrument(level = "debug", skip_all, fields(%url, program = %self.program))]
    async fn extract(&self, url: &str) -> ExtractResult<PageContent> {
        let parsed = Url::parse(url)?;
        // Removed on drop, whichever way this function returns.
        let dest = NamedTempFile::new()?;

        self.download(url, &dest).await?;

        let bytes = tokio::fs::read(dest.path()).await?;
        debug!(bytes = bytes.len(), "Downloaded article page");
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(ExtractError::NoContent);
        }

        let html = String::from_utf8_lossy(&bytes).into_owned();
        self.pool
            .run(move || engine::extract_page(&html, &parsed))
            .await?
    }
}
