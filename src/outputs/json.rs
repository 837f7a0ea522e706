//! JSON output.
//!
//! The result set is written as a pretty-printed array (4-space indent,
//! non-ASCII text left as is). Writes are atomic: the document goes to a
//! hidden temporary file next to the target, is flushed to disk, and is then
//! renamed over the final name. A crash mid-write leaves at most a stray
//! temporary file, never a truncated artifact under the final name.

use crate::error::SinkError;
use crate::models::Record;
use crate::utils::parent_dir;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, instrument};

/// Persists the final record set to one JSON file.
#[derive(Debug, Clone)]
pub struct JsonSink {
    path: PathBuf,
}

impl JsonSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize `records` in the given order and write them atomically.
    pub async fn write_records(&self, records: &[Record]) -> Result<(), SinkError> {
        write_json(&self.path, records).await?;
        info!(path = %self.path.display(), count = records.len(), "Wrote news JSON");
        Ok(())
    }
}

/// Serialize any value as 4-space indented JSON.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    out.push(b'\n');
    Ok(out)
}

/// Serialize `value` and atomically replace `path` with it.
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), SinkError> {
    let bytes = to_pretty_json(value)?;
    write_atomic(path, &bytes).await
}

/// Write `bytes` to a temporary sibling of `path`, then rename it into place.
///
/// The temporary file is hidden, lives in the same directory as `path` so
/// the rename stays on one filesystem, and is flushed with `sync_all` before
/// the rename. Readers therefore see either the previous artifact or the new
/// one, never a prefix.
///
/// # Arguments
///
/// * `path` - Final artifact location; its parent directory is created
/// * `bytes` - Complete file contents
///
/// # Errors
///
/// [`SinkError::Io`] if any step fails. The temporary file is removed and
/// the previous artifact, if any, is left untouched.
#[instrument(level = "debug", skip(bytes), fields(path = %path.display(), bytes = bytes.len()))]
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SinkError> {
    let io_err = |source| SinkError::Io {
        path: path.display().to_string(),
        source,
    };

    let dir = parent_dir(path);
    fs::create_dir_all(&dir).await.map_err(io_err)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let tmp = dir.join(format!(".{}.{}.tmp", file_name, std::process::id()));

    let written = async {
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, path).await
    }
    .await;

    if let Err(e) = written {
        error!(tmp = %tmp.display(), error = %e, "Atomic write failed");
        let _ = fs::remove_file(&tmp).await;
        return Err(io_err(e));
    }
    Ok(())
}
