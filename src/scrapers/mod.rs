//! Site extractors.
//!
//! Every news site is an [`Extractor`]: given a [`FetchClient`] it produces a
//! lazy, finite stream of [`Extracted`] events, one per discovered article.
//! The conveyor drives all extractors uniformly through this trait.
//!
//! The stock sites share one traversal engine, [`listing::ListingExtractor`],
//! which walks paginated listing pages and optionally follows each item to
//! its article page. Sites only supply the markup rules as a [`SiteParser`].
//!
//! # Supported Sources
//!
//! | Source | Module | Listing items |
//! |--------|--------|---------------|
//! | Kommersant | [`kommersant`] | `article.uho` cards, relative links |
//! | RBC | [`rbc`] | `div.item__wrap` cards |
//! | iXBT | [`ixbt`] | `li.item` rows, relative links |
//! | RIA Novosti | [`ria`] | `div.list-item` rows, "load more" pagination |

pub mod ixbt;
pub mod kommersant;
pub mod listing;
pub mod page;
pub mod rbc;
pub mod ria;

use crate::config::{ExtractorDescriptor, ParserKind};
use crate::error::{ConfigError, ExtractError, ParseError};
use crate::fetch::FetchClient;
use crate::models::RawArticle;
use futures::stream::BoxStream;
use listing::ListingExtractor;
use url::Url;

/// One event from an extractor's sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    /// Raw fields of one discovered article.
    Article(RawArticle),
    /// One page or article could not be fetched or parsed; the sequence goes on.
    Failed(ExtractError),
    /// The source is unusable as a whole; this is the last event.
    SourceFailed(ExtractError),
}

/// A site-specific article source.
pub trait Extractor: Send + Sync {
    fn site_id(&self) -> &str;

    /// Start a fresh walk over the site. Each call restarts from the entry
    /// URLs; the stream ends when the site is exhausted.
    fn articles<'a>(&'a self, client: &'a dyn FetchClient) -> BoxStream<'a, Extracted>;
}

/// A listing item as scraped from a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingItem {
    pub title: String,
    pub url: Url,
    pub published: Option<String>,
}

/// Markup rules for one site.
pub trait SiteParser: Send + Sync {
    /// Split a listing page into items. A malformed item is an `Err` entry;
    /// an `Err` overall means the page is not a listing at all.
    fn parse_listing(
        &self,
        html: &str,
        page_url: &Url,
    ) -> Result<Vec<Result<ListingItem, ParseError>>, ParseError>;

    /// Selector for body paragraphs on an article page.
    fn body_selector(&self) -> &scraper::Selector;

    /// URL of the listing page that follows `page_url`, if any.
    fn next_page(&self, html: &str, page_url: &Url) -> Option<Url> {
        page::rel_next(html, page_url)
    }
}

/// Build the extractor a descriptor refers to.
pub fn build(descriptor: &ExtractorDescriptor) -> Result<Box<dyn Extractor>, ConfigError> {
    let extractor: Box<dyn Extractor> = match descriptor.parser {
        ParserKind::Kommersant => Box::new(ListingExtractor::new(descriptor, kommersant::Kommersant)?),
        ParserKind::Rbc => Box::new(ListingExtractor::new(descriptor, rbc::Rbc)?),
        ParserKind::Ixbt => Box::new(ListingExtractor::new(descriptor, ixbt::Ixbt)?),
        ParserKind::Ria => Box::new(ListingExtractor::new(descriptor, ria::Ria)?),
    };
    Ok(extractor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConveyorConfig;

    #[test]
    fn test_build_every_default_extractor() {
        let config = ConveyorConfig::default();
        let ids: Vec<String> = config
            .extractors
            .iter()
            .map(|d| build(d).unwrap().site_id().to_string())
            .collect();
        assert_eq!(ids, vec!["Kommersant", "RBC", "IXBT", "RIA"]);
    }

    #[test]
    fn test_build_rejects_bad_entry_url() {
        let mut descriptor = ExtractorDescriptor::new("X", ParserKind::Rbc, "https://x/");
        descriptor.entry_urls.push("not a url".to_string());
        assert!(build(&descriptor).is_err());
    }
}
