//! Error taxonomy for the conveyor.
//!
//! Only [`ConfigError`] and [`SinkError`] ever reach `main`. Fetch, parse and
//! validation failures are caught at the task boundary and recorded as
//! diagnostics; a [`RunTimeoutError`] turns the run into a partial completion.

use std::time::Duration;
use thiserror::Error;

/// Failure retrieving one page.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("timed out after {timeout:?} fetching {url}")]
    Timeout { url: String, timeout: Duration },

    #[error("transport error fetching {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            Self::Timeout { url, .. }
            | Self::Transport { url, .. }
            | Self::Status { url, .. }
            | Self::InvalidUrl { url, .. } => url,
        }
    }
}

/// Page retrieved, but the structure the parser expects is absent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unexpected markup at {url}: {reason}")]
pub struct ParseError {
    pub url: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Anything an extractor can report while walking its site.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Schema violation detected by the transform stage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field(s): {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("duplicate url {0}")]
    Duplicate(String),
}

impl ValidationError {
    /// Names of the offending fields.
    pub fn fields(&self) -> Vec<&'static str> {
        match self {
            Self::Missing(fields) => fields.clone(),
            Self::Invalid { field, .. } => vec![*field],
            Self::Duplicate(_) => vec!["url"],
        }
    }
}

/// The global run deadline elapsed before every extractor finished.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("run deadline of {0:?} exceeded")]
pub struct RunTimeoutError(pub Duration);

/// Configuration fault; the only kind that prevents a run from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no extractors configured")]
    NoExtractors,

    #[error("extractor `{site_id}`: {reason}")]
    Extractor { site_id: String, reason: String },

    #[error("{0}")]
    Invalid(String),

    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("output path {path} is not writable: {source}")]
    Unwritable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure persisting an artifact.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_fields() {
        let err = ValidationError::Missing(vec!["title", "body"]);
        assert_eq!(err.fields(), vec!["title", "body"]);
        assert_eq!(err.to_string(), "missing required field(s): title, body");

        let err = ValidationError::Invalid {
            field: "url",
            reason: "relative URL without a base".to_string(),
        };
        assert_eq!(err.fields(), vec!["url"]);
    }

    #[test]
    fn test_extract_error_is_transparent() {
        let err: ExtractError = FetchError::Status {
            url: "https://a/1".to_string(),
            status: 503,
        }
        .into();
        assert_eq!(err.to_string(), "HTTP 503 for https://a/1");
    }
}
