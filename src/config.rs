//! Run configuration.
//!
//! A YAML file deserializes into [`ConveyorConfig`]; every field has a
//! default, so a file only needs the parts it changes. Without a file the
//! built-in configuration covers the four stock sources.
//!
//! ```yaml
//! run_timeout_seconds: 90
//! output_path: out/news_data.json
//! extractors:
//!   - site_id: RIA
//!     parser: ria
//!     entry_urls: ["https://ria.ru/technology/"]
//!     timeout_seconds: 20
//! ```

use crate::conveyor::DuplicatePolicy;
use crate::error::ConfigError;
use crate::fetch::FetchSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

/// Which site parser an extractor descriptor refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    Kommersant,
    Rbc,
    Ixbt,
    Ria,
}

/// Static description of one extractor, immutable for the run.
///
/// Unknown keys are rejected so a misspelled option fails at load time
/// instead of silently falling back to its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractorDescriptor {
    pub site_id: String,
    pub parser: ParserKind,
    pub entry_urls: Vec<String>,
    #[serde(default = "default_extractor_timeout")]
    pub timeout_seconds: f64,
    /// Listing pages to walk per entry URL.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

impl ExtractorDescriptor {
    pub fn new(site_id: &str, parser: ParserKind, entry_url: &str) -> Self {
        Self {
            site_id: site_id.to_string(),
            parser,
            entry_urls: vec![entry_url.to_string()],
            timeout_seconds: default_extractor_timeout(),
            max_pages: default_max_pages(),
        }
    }

    /// Per-request timeout. Only meaningful after [`ConveyorConfig::validate`].
    pub fn timeout(&self) -> Duration {
        saturating_secs(self.timeout_seconds)
    }

    /// Entry URLs as parsed absolute http(s) URLs.
    pub fn parsed_entry_urls(&self) -> Result<Vec<Url>, ConfigError> {
        self.entry_urls
            .iter()
            .map(|raw| {
                let url = Url::parse(raw).map_err(|e| self.invalid(format!("entry url {raw}: {e}")))?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(self.invalid(format!("entry url {raw} is not http(s)")));
                }
                Ok(url)
            })
            .collect()
    }

    fn invalid(&self, reason: String) -> ConfigError {
        ConfigError::Extractor {
            site_id: self.site_id.clone(),
            reason,
        }
    }
}

/// Whole-run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConveyorConfig {
    pub extractors: Vec<ExtractorDescriptor>,
    pub run_timeout_seconds: f64,
    pub output_path: PathBuf,
    pub diagnostics_path: Option<PathBuf>,
    pub max_connections_per_host: usize,
    pub user_agent: String,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for ConveyorConfig {
    fn default() -> Self {
        Self {
            extractors: vec![
                ExtractorDescriptor::new(
                    "Kommersant",
                    ParserKind::Kommersant,
                    "https://www.kommersant.ru/hitech?from=burger",
                ),
                ExtractorDescriptor::new(
                    "RBC",
                    ParserKind::Rbc,
                    "https://www.rbc.ru/technology_and_media/?utm_source=topline",
                ),
                ExtractorDescriptor::new("IXBT", ParserKind::Ixbt, "https://www.ixbt.com/news/"),
                ExtractorDescriptor::new("RIA", ParserKind::Ria, "https://ria.ru/technology/"),
            ],
            run_timeout_seconds: 120.0,
            output_path: PathBuf::from("news_data.json"),
            diagnostics_path: None,
            max_connections_per_host: 4,
            user_agent: FetchSettings::default().user_agent,
            duplicate_policy: DuplicatePolicy::FirstWins,
        }
    }
}

impl ConveyorConfig {
    /// Load a YAML config file.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })?;
        info!(extractors = config.extractors.len(), "Loaded configuration");
        Ok(config)
    }

    /// Global deadline. Only meaningful after [`ConveyorConfig::validate`].
    pub fn run_timeout(&self) -> Duration {
        saturating_secs(self.run_timeout_seconds)
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            user_agent: self.user_agent.clone(),
            max_connections_per_host: self.max_connections_per_host,
            ..FetchSettings::default()
        }
    }

    /// Reject configurations that cannot start a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extractors.is_empty() {
            return Err(ConfigError::NoExtractors);
        }
        if seconds(self.run_timeout_seconds).is_none() {
            return Err(ConfigError::Invalid(format!(
                "run_timeout_seconds must be a positive, representable number of seconds, got {}",
                self.run_timeout_seconds
            )));
        }
        if self.max_connections_per_host == 0 {
            return Err(ConfigError::Invalid(
                "max_connections_per_host must be at least 1".to_string(),
            ));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("output_path is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for descriptor in &self.extractors {
            if descriptor.site_id.trim().is_empty() {
                return Err(ConfigError::Invalid("extractor with empty site_id".to_string()));
            }
            if !seen.insert(descriptor.site_id.as_str()) {
                return Err(descriptor.invalid("duplicate site_id".to_string()));
            }
            if descriptor.entry_urls.is_empty() {
                return Err(descriptor.invalid("no entry_urls".to_string()));
            }
            if seconds(descriptor.timeout_seconds).is_none() {
                return Err(descriptor.invalid(format!(
                    "timeout_seconds must be a positive, representable number of seconds, got {}",
                    descriptor.timeout_seconds
                )));
            }
            if descriptor.max_pages == 0 {
                return Err(descriptor.invalid("max_pages must be at least 1".to_string()));
            }
            descriptor.parsed_entry_urls()?;
        }
        Ok(())
    }
}

/// A non-zero [`Duration`], or `None` for negative, NaN, infinite, vanishingly
/// small or overflowing values.
fn seconds(value: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(value)
        .ok()
        .filter(|d| !d.is_zero())
}

fn saturating_secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}

fn default_extractor_timeout() -> f64 {
    30.0
}

fn default_max_pages() -> usize {
    1
}
