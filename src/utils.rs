//! Utility functions for text cleanup, log output and file system checks.
//!
//! - Whitespace normalization for scraped text
//! - String truncation for log lines
//! - Writable-location probe for output artifacts

use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Collapse runs of whitespace (including NBSP and newlines) into single
/// spaces and trim both ends.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_whitespace("  a\n\t b  "), "a b");
/// ```
pub fn normalize_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a char boundary) with an
/// ellipsis and the number of dropped bytes appended.
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

/// Directory that will receive `path`, treating a bare file name as the
/// current directory.
pub fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Ensure the directory that will hold `path` exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_parent(path: &Path) -> io::Result<()> {
    let dir = parent_dir(path);
    fs::create_dir_all(&dir).await?;

    let probe = dir.join(format!(".{}.probe", std::process::id()));
    fs::write(&probe, b"").await?;
    let _ = fs::remove_file(&probe).await;
    debug!(dir = %dir.display(), "Output directory is writable");
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
        // Cyrillic letters are two bytes each
        let s = "новости";
        let result = truncate_for_log(s, 3);
        assert!(result.starts_with("н…"));
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a\n\t b  "), "a b");
        assert_eq!(normalize_whitespace("x\u{a0}\u{a0}y"), "x y");
        assert_eq!(normalize_whitespace("   "), "");
    }

    #[test]
    fn test_parent_dir_of_bare_file_name() {
        assert_eq!(parent_dir(Path::new("news_data.json")), PathBuf::from("."));
        assert_eq!(parent_dir(Path::new("out/news.json")), PathBuf::from("out"));
    }

    #[tokio::test]
    async fn test_ensure_writable_parent_creates_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("nested").join("news.json");
        ensure_writable_parent(&target).await.unwrap();
        assert!(tmp.path().join("nested").is_dir());
    }
}
