//! Validation and normalization of raw extractor output.
//!
//! [`validate`] is a pure function: it never panics on bad input, it returns a
//! [`ValidationError`] naming every offending field instead.
//!
//! Rules:
//! - `title`, `url`, `source` and one of `body`/`summary` are required and
//!   must be non-empty after whitespace normalization
//! - `url` must be an absolute `http`/`https` URL with a host
//! - `published_at` is parsed against a fixed set of formats; anything that
//!   does not parse is treated as absent, never as an error
//!
//! Timestamps without an offset are read as UTC. Article pages usually
//! publish `article:published_time` with an explicit offset, and that value
//! wins over the listing text, so only items whose page lacks it keep a
//! naive listing time. For the Moscow-based stock sites such a time is up to
//! three hours ahead of the real UTC instant.

use crate::error::ValidationError;
use crate::models::{RawArticle, Record, fields};
use crate::utils::normalize_whitespace;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use url::Url;

/// Naive date-time layouts; interpreted as UTC.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M",
    "%d.%m.%Y, %H:%M",
    "%H:%M, %d.%m.%Y",
];

/// Date-only layouts; interpreted as midnight UTC.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y"];

/// Map a raw field mapping from `source` into a [`Record`].
///
/// Text fields are whitespace-normalized first; `summary` stands in for a
/// missing `body`.
///
/// # Arguments
///
/// * `raw` - Field mapping as the extractor scraped it
/// * `source` - Site identifier of the extractor that produced `raw`
///
/// # Returns
///
/// The validated record, or a [`ValidationError`]:
/// - `Missing` listing every required field that is absent or blank
/// - `Invalid { field: "url", .. }` for a relative or non-http(s) URL
///
/// # Examples
///
/// ```ignore
/// let raw = RawArticle::new()
///     .with(fields::TITLE, Some("  Chips  "))
///     .with(fields::URL, Some("https://www.rbc.ru/a/1"))
///     .with(fields::SUMMARY, Some("Short"));
/// let record = validate(&raw, "RBC")?;
/// assert_eq!(record.title(), "Chips");
/// assert_eq!(record.body(), "Short");
/// ```
pub fn validate(raw: &RawArticle, source: &str) -> Result<Record, ValidationError> {
    let title = text_field(raw, fields::TITLE);
    let url = text_field(raw, fields::URL);
    let source = non_empty(normalize_whitespace(source));
    let body = text_field(raw, fields::BODY).or_else(|| text_field(raw, fields::SUMMARY));

    let mut missing = Vec::new();
    if title.is_none() {
        missing.push(fields::TITLE);
    }
    if url.is_none() {
        missing.push(fields::URL);
    }
    if source.is_none() {
        missing.push(fields::SOURCE);
    }
    if body.is_none() {
        missing.push(fields::BODY);
    }

    match (title, url, source, body) {
        (Some(title), Some(url), Some(source), Some(body)) => {
            let url = parse_absolute_url(&url)?;
            let published_at = raw.get(fields::PUBLISHED_AT).and_then(parse_timestamp);
            Ok(Record::new(title, url, published_at, source, body))
        }
        _ => Err(ValidationError::Missing(missing)),
    }
}

fn text_field(raw: &RawArticle, key: &str) -> Option<String> {
    raw.get(key).map(normalize_whitespace).and_then(non_empty)
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

fn parse_absolute_url(value: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(value).map_err(|e| ValidationError::Invalid {
        field: fields::URL,
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ValidationError::Invalid {
            field: fields::URL,
            reason: format!("unsupported scheme `{}`", url.scheme()),
        });
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ValidationError::Invalid {
            field: fields::URL,
            reason: "missing host".to_string(),
        });
    }
    Ok(url)
}

/// Parse a scraped timestamp against the accepted formats.
///
/// Offset-aware RFC 3339 comes first, then the naive layouts (as UTC), then
/// bare dates (midnight UTC).
///
/// # Returns
///
/// `None` for blank or unrecognised input.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = normalize_whitespace(value);
    if value.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(&value) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(&value, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(&value, fmt) {
            return Some(ts.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&value, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|ts| ts.and_utc());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw(pairs: &[(&str, &str)]) -> RawArticle {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_valid_article_is_normalized() {
        let r = validate(
            &raw(&[
                ("title", "  A1 \n"),
                ("url", "https://a/1"),
                ("body", "Some   text"),
            ]),
            "SiteA",
        )
        .unwrap();
        assert_eq!(r.title(), "A1");
        assert_eq!(r.url(), "https://a/1");
        assert_eq!(r.source(), "SiteA");
        assert_eq!(r.body(), "Some text");
        assert_eq!(r.published_at(), None);
    }

    #[test]
    fn test_summary_fills_in_for_missing_body() {
        let r = validate(
            &raw(&[
                ("title", "A1"),
                ("url", "https://a/1"),
                ("body", "   "),
                ("summary", "Short"),
            ]),
            "SiteA",
        )
        .unwrap();
        assert_eq!(r.body(), "Short");
    }

    #[test]
    fn test_every_missing_required_field_is_reported() {
        let err = validate(&raw(&[("title", "   ")]), "").unwrap_err();
        assert_eq!(err.fields(), vec!["title", "url", "source", "body"]);
    }

    #[test]
    fn test_each_single_missing_field_rejects() {
        let full = [
            ("title", "A1"),
            ("url", "https://a/1"),
            ("body", "Text"),
        ];
        for skip in 0..full.len() {
            let partial: Vec<_> = full
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, kv)| *kv)
                .collect();
            let err = validate(&raw(&partial), "SiteA").unwrap_err();
            assert!(matches!(err, ValidationError::Missing(ref f) if f.len() == 1));
        }
    }

    #[test]
    fn test_relative_or_non_http_url_is_invalid() {
        for url in ["/news/1", "ftp://a/1", "mailto:x@y.z"] {
            let err = validate(
                &raw(&[("title", "A1"), ("url", url), ("body", "Text")]),
                "SiteA",
            )
            .unwrap_err();
            assert_eq!(err.fields(), vec!["url"], "url {url}");
        }
    }

    #[test]
    fn test_unparseable_timestamp_becomes_absent() {
        let r = validate(
            &raw(&[
                ("title", "A1"),
                ("url", "https://a/1"),
                ("body", "Text"),
                ("published_at", "вчера, 12:45"),
            ]),
            "SiteA",
        )
        .unwrap();
        assert_eq!(r.published_at(), None);
    }

    #[test]
    fn test_accepted_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 10, 14, 9, 30, 0).unwrap();
        for value in [
            "2024-10-14T12:30:00+03:00",
            "2024-10-14T09:30:00Z",
            "2024-10-14T12:30:00+0300",
            "2024-10-14T09:30:00",
            "2024-10-14 09:30:00",
            "2024-10-14 09:30",
            "14.10.2024 09:30",
            "14.10.2024, 09:30",
            "09:30, 14.10.2024",
        ] {
            assert_eq!(parse_timestamp(value), Some(expected), "format {value}");
        }

        let midnight = Utc.with_ymd_and_hms(2024, 10, 14, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-10-14"), Some(midnight));
        assert_eq!(parse_timestamp("14.10.2024"), Some(midnight));
        assert_eq!(parse_timestamp("12:45"), None);
        assert_eq!(parse_timestamp(""), None);
    }
}
