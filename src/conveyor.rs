//! The conveyor: fan-out over every extractor, fan-in through validation.
//!
//! All extractors are driven concurrently from a single task. Their streams
//! are merged with [`futures::stream::select_all`]; the only suspension points
//! are the fetches inside each extractor, while validation and bookkeeping
//! run synchronously between polls. That makes [`RunState`] plain owned data
//! mutated by one thread of control, with no locking.
//!
//! Per article the life cycle is
//! `Pending -> Fetching -> Parsing -> Validating -> {Accepted, Rejected, Failed}`.
//! Only the terminal states are observable here, as a [`TaskOutcome`].
//! `Rejected` and `Failed` are recorded as diagnostics and never affect
//! sibling work.
//!
//! On the global deadline the merged stream is dropped, which cancels every
//! in-flight fetch at its next suspension point; records accepted so far are
//! kept and the run is reported as partial.

use crate::error::{ConfigError, ExtractError, RunTimeoutError, ValidationError};
use crate::fetch::FetchClient;
use crate::models::{RawArticle, Record};
use crate::scrapers::{Extracted, Extractor};
use crate::transform;
use crate::utils::truncate_for_log;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// What happens when two accepted records share a URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the first accepted record; later ones are rejected as duplicates.
    #[default]
    FirstWins,
    /// The later record replaces the earlier one, which counts as rejected.
    LastWins,
}

/// Per-source counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub failed_count: usize,
    pub rejected_count: usize,
    pub accepted_count: usize,
}

/// `source -> counters`, ordered by source.
pub type Diagnostics = BTreeMap<String, SourceStats>;

/// Terminal state of one unit of work.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Accepted,
    Rejected(ValidationError),
    Failed(ExtractError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Failed,
    Rejected,
}

/// One `Failed` or `Rejected` unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticEntry {
    pub source: String,
    pub kind: EntryKind,
    pub detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every extractor reached the end of its sequence.
    Complete,
    /// The deadline elapsed; whatever was accepted is kept.
    Partial(RunTimeoutError),
    /// Every extractor finished but none produced an accepted record.
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial(_) => "partial",
            Self::Failed => "failed",
        }
    }
}

/// Mutable aggregate for one run. Create one per run and hand it to
/// [`Conveyor::run`]; nothing survives across runs.
#[derive(Debug, Default)]
pub struct RunState {
    records: Vec<Record>,
    by_url: HashMap<String, usize>,
    diagnostics: Diagnostics,
    entries: Vec<DiagnosticEntry>,
    failed_sources: BTreeSet<String>,
    finished_sources: BTreeSet<String>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepted(&self) -> usize {
        self.records.len()
    }

    fn stats(&mut self, source: &str) -> &mut SourceStats {
        self.diagnostics.entry(source.to_string()).or_default()
    }

    /// Route one extractor event to its terminal state.
    pub fn absorb(&mut self, source: &str, event: Extracted, policy: DuplicatePolicy) -> TaskOutcome {
        match event {
            Extracted::Article(raw) => self.validate(source, &raw, policy),
            Extracted::Failed(error) => self.fail(source, error),
            Extracted::SourceFailed(error) => {
                warn!(%source, error = %error, "Source failed as a whole");
                self.failed_sources.insert(source.to_string());
                self.fail(source, error)
            }
        }
    }

    fn validate(&mut self, source: &str, raw: &RawArticle, policy: DuplicatePolicy) -> TaskOutcome {
        match transform::validate(raw, source) {
            Ok(record) => self.accept(record, policy),
            Err(error) => {
                let url = raw.get(crate::models::fields::URL).map(str::to_string);
                self.reject(source, error, url)
            }
        }
    }

    fn accept(&mut self, record: Record, policy: DuplicatePolicy) -> TaskOutcome {
        let source = record.source().to_string();
        let url = record.url().to_string();

        let Some(&slot) = self.by_url.get(&url) else {
            debug!(
                %source,
                %url,
                title = %truncate_for_log(record.title(), 120),
                published_at = ?record.published_at(),
                body_bytes = record.body().len(),
                "Accepted record"
            );
            self.by_url.insert(url, self.records.len());
            self.records.push(record);
            self.stats(&source).accepted_count += 1;
            return TaskOutcome::Accepted;
        };

        match policy {
            DuplicatePolicy::FirstWins => self.reject(&source, ValidationError::Duplicate(url.clone()), Some(url)),
            DuplicatePolicy::LastWins => {
                let displaced = std::mem::replace(&mut self.records[slot], record);
                let old_source = displaced.source().to_string();
                self.stats(&old_source).accepted_count -= 1;
                self.reject(&old_source, ValidationError::Duplicate(url.clone()), Some(url));
                self.stats(&source).accepted_count += 1;
                TaskOutcome::Accepted
            }
        }
    }

    fn reject(&mut self, source: &str, error: ValidationError, url: Option<String>) -> TaskOutcome {
        warn!(%source, url = url.as_deref().unwrap_or("-"), error = %error, "Rejected article");
        self.stats(source).rejected_count += 1;
        self.entries.push(DiagnosticEntry {
            source: source.to_string(),
            kind: EntryKind::Rejected,
            detail: error.to_string(),
            fields: error.fields(),
            url,
        });
        TaskOutcome::Rejected(error)
    }

    fn fail(&mut self, source: &str, error: ExtractError) -> TaskOutcome {
        let url = match &error {
            ExtractError::Fetch(e) => e.url().to_string(),
            ExtractError::Parse(e) => e.url.clone(),
        };
        warn!(%source, %url, error = %truncate_for_log(&error.to_string(), 300), "Extraction failed");
        self.stats(source).failed_count += 1;
        self.entries.push(DiagnosticEntry {
            source: source.to_string(),
            kind: EntryKind::Failed,
            detail: error.to_string(),
            fields: Vec::new(),
            url: Some(url),
        });
        TaskOutcome::Failed(error)
    }

    fn finish_source(&mut self, source: &str) {
        let stats = *self.stats(source);
        info!(
            %source,
            accepted = stats.accepted_count,
            rejected = stats.rejected_count,
            failed = stats.failed_count,
            "Source exhausted"
        );
        self.finished_sources.insert(source.to_string());
    }

    /// Close the run: sort records into persistence order.
    pub fn into_report(self, status: RunStatus) -> RunReport {
        let unfinished_sources = self
            .diagnostics
            .keys()
            .filter(|s| !self.finished_sources.contains(*s))
            .cloned()
            .collect();

        RunReport {
            status,
            records: self
                .records
                .into_iter()
                .sorted_by(Record::output_order)
                .collect(),
            diagnostics: self.diagnostics,
            entries: self.entries,
            failed_sources: self.failed_sources.into_iter().collect(),
            unfinished_sources,
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    #[serde(serialize_with = "serialize_status")]
    pub status: RunStatus,
    #[serde(skip)]
    pub records: Vec<Record>,
    #[serde(rename = "sources")]
    pub diagnostics: Diagnostics,
    pub failed_sources: Vec<String>,
    pub unfinished_sources: Vec<String>,
    pub entries: Vec<DiagnosticEntry>,
}

fn serialize_status<S: serde::Serializer>(status: &RunStatus, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(status.as_str())
}

/// Concurrent extraction across a fixed set of extractors.
pub struct Conveyor {
    extractors: Vec<Box<dyn Extractor>>,
    client: Arc<dyn FetchClient>,
    run_timeout: Duration,
    duplicate_policy: DuplicatePolicy,
}

impl Conveyor {
    pub fn new(
        extractors: Vec<Box<dyn Extractor>>,
        client: Arc<dyn FetchClient>,
        run_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        if extractors.is_empty() {
            return Err(ConfigError::NoExtractors);
        }
        Ok(Self {
            extractors,
            client,
            run_timeout,
            duplicate_policy: DuplicatePolicy::default(),
        })
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Run every extractor to completion (or until the deadline) and return
    /// the sorted result set with diagnostics.
    pub async fn execute(&self) -> RunReport {
        let mut state = RunState::new();
        let status = self.run(&mut state).await;
        state.into_report(status)
    }

    /// Drive all extractors concurrently, folding their events into `state`.
    ///
    /// Each extractor stream is tagged with its site id and terminated with an
    /// end marker, then all are merged on this task. Events are absorbed in
    /// arrival order; within one site that is the order the extractor yields.
    ///
    /// # Arguments
    ///
    /// * `state` - Fresh per-run aggregate; receives records and diagnostics
    ///
    /// # Returns
    ///
    /// - [`RunStatus::Complete`] when every stream ended with at least one
    ///   accepted record overall
    /// - [`RunStatus::Failed`] when every stream ended with none
    /// - [`RunStatus::Partial`] when the deadline fired first; the merged
    ///   stream is dropped, cancelling outstanding fetches, and `state` keeps
    ///   what was accepted
    #[instrument(level = "info", skip_all, fields(extractors = self.extractors.len(), timeout = ?self.run_timeout))]
    pub async fn run(&self, state: &mut RunState) -> RunStatus {
        let client: &dyn FetchClient = self.client.as_ref();

        for extractor in &self.extractors {
            state.stats(extractor.site_id());
        }

        // `None` marks the end of one extractor's sequence
        let mut merged = stream::select_all(self.extractors.iter().map(|extractor| {
            let site = extractor.site_id();
            extractor
                .articles(client)
                .map(Some)
                .chain(stream::once(async { None }))
                .map(move |event| (site, event))
                .boxed()
        }));

        let deadline = tokio::time::sleep(self.run_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = &mut deadline => {
                    warn!(
                        accepted = state.accepted(),
                        "Run deadline reached; cancelling outstanding work"
                    );
                    return RunStatus::Partial(RunTimeoutError(self.run_timeout));
                }
                next = merged.next() => match next {
                    Some((site, Some(event))) => {
                        state.absorb(site, event, self.duplicate_policy);
                    }
                    Some((site, None)) => state.finish_source(site),
                    None => break,
                },
            }
        }

        if state.accepted() == 0 {
            warn!("No extractor produced an accepted record");
            RunStatus::Failed
        } else {
            info!(accepted = state.accepted(), "All extractors finished");
            RunStatus::Complete
        }
    }
}
