//! Utility functions for string handling and file system checks.
//!
//! This module provides helpers used throughout the application:
//! - String truncation for log previews of subprocess output and pages
//! - Whitespace normalization for extracted article text
//! - File system validation for output directories

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

static RE_INLINE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{00A0}]+").unwrap());
static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n+").unwrap());

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (backing off to a character
/// boundary) with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Normalize extracted article text.
///
/// Runs of spaces and tabs collapse to one space, runs of blank lines collapse
/// to a single paragraph break, and every line is trimmed.
pub fn normalize_text(s: &str) -> String {
    let s = s.replace("\r\n", "\n");
    let s = RE_INLINE_WS.replace_all(&s, " ");
    let s = RE_BLANK_LINES.replace_all(&s, "\n\n");
    s.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        let s = "é".repeat(10); // 2 bytes each
        let result = truncate_for_log(&s, 5);
        assert!(result.starts_with("éé…"));
        assert!(result.contains("(+16 bytes)"));
    }

    #[test]
    fn test_normalize_text() {
        let raw = "  Title\t\there \r\n\r\n\r\n   First   paragraph.\n \n\nSecond.  ";
        assert_eq!(normalize_text(raw), "Title here\n\nFirst paragraph.\n\nSecond.");
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("reports/nested");
        ensure_writable_dir(nested.to_str().unwrap()).await.unwrap();
        assert!(nested.is_dir());
    }
}
