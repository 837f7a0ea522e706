//! Data models for extracted articles and their normalized representation.
//!
//! - [`RawArticle`]: loose string fields as an extractor scraped them
//! - [`Record`]: the validated, immutable output unit
//!
//! A `Record` can only be built by [`crate::transform::validate`]; once built
//! it is never mutated, the conveyor only appends or filters them.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use url::Url;

/// Field keys an extractor may fill, named after [`Record`] attributes.
pub mod fields {
    pub const TITLE: &str = "title";
    pub const URL: &str = "url";
    pub const PUBLISHED_AT: &str = "published_at";
    pub const SOURCE: &str = "source";
    pub const BODY: &str = "body";
    pub const SUMMARY: &str = "summary";
}

/// A raw field mapping for one discovered article, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawArticle {
    fields: BTreeMap<String, String>,
}

impl RawArticle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert; `None` values are skipped.
    pub fn with(mut self, key: &str, value: Option<impl Into<String>>) -> Self {
        if let Some(value) = value {
            self.fields.insert(key.to_string(), value.into());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawArticle {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A normalized, validated news article.
///
/// Serializes with the keys `title, url, published_at, source, body`;
/// `published_at` is `null` or an RFC 3339 UTC timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    title: String,
    #[serde(serialize_with = "serialize_url")]
    url: Url,
    #[serde(serialize_with = "serialize_published_at")]
    published_at: Option<DateTime<Utc>>,
    source: String,
    body: String,
}

impl Record {
    /// Only the transform stage constructs records.
    pub(crate) fn new(
        title: String,
        url: Url,
        published_at: Option<DateTime<Utc>>,
        source: String,
        body: String,
    ) -> Self {
        Self {
            title,
            url,
            published_at,
            source,
            body,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Natural key of the record within one run.
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Persistence order: `(source, published_at or epoch zero, url)`.
    pub fn output_order(&self, other: &Self) -> Ordering {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        self.source
            .cmp(&other.source)
            .then_with(|| {
                self.published_at
                    .unwrap_or(epoch)
                    .cmp(&other.published_at.unwrap_or(epoch))
            })
            .then_with(|| self.url.as_str().cmp(other.url.as_str()))
    }
}

fn serialize_url<S: Serializer>(url: &Url, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(url.as_str())
}

fn serialize_published_at<S: Serializer>(
    ts: &Option<DateTime<Utc>>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match ts {
        Some(ts) => s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
        None => s.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(source: &str, ts: Option<DateTime<Utc>>, url: &str) -> Record {
        Record::new(
            "Title".to_string(),
            Url::parse(url).unwrap(),
            ts,
            source.to_string(),
            "Body".to_string(),
        )
    }

    #[test]
    fn test_raw_article_builder_skips_none() {
        let raw = RawArticle::new()
            .with(fields::TITLE, Some("A1"))
            .with(fields::PUBLISHED_AT, None::<String>);
        assert_eq!(raw.get(fields::TITLE), Some("A1"));
        assert_eq!(raw.get(fields::PUBLISHED_AT), None);
    }

    #[test]
    fn test_record_serialization_key_order() {
        let r = record("SiteA", None, "https://a/1");
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(
            json,
            r#"{"title":"Title","url":"https://a/1","published_at":null,"source":"SiteA","body":"Body"}"#
        );
    }

    #[test]
    fn test_record_serializes_timestamp_as_rfc3339_utc() {
        let ts = Utc.with_ymd_and_hms(2024, 10, 14, 9, 30, 0).unwrap();
        let r = record("SiteA", Some(ts), "https://a/1");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["published_at"], "2024-10-14T09:30:00Z");
    }

    #[test]
    fn test_output_order_source_then_time_then_url() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let undated = record("A", None, "https://a/2");
        let dated = record("A", Some(ts), "https://a/1");
        let other_source = record("B", None, "https://b/0");

        assert_eq!(undated.output_order(&dated), Ordering::Less);
        assert_eq!(dated.output_order(&other_source), Ordering::Less);

        let same_time = record("A", None, "https://a/1");
        assert_eq!(same_time.output_order(&undated), Ordering::Less);
    }
}
