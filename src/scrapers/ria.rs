//! RIA Novosti section scraper.
//!
//! Section pages list stories as `div.list-item` rows whose title link is
//! absolute. Further pages are loaded through the "more" button, whose
//! `data-url` points at the next chunk of rows.

use super::page::{self, ListingRules, css};
use super::{ListingItem, SiteParser};
use crate::error::ParseError;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

static ITEM: Lazy<Selector> = Lazy::new(|| css("div.list-item"));
static TITLE: Lazy<Selector> = Lazy::new(|| css("a.list-item__title[href]"));
static TIME: Lazy<Selector> = Lazy::new(|| css("div.list-item__date"));
static BODY: Lazy<Selector> = Lazy::new(|| css("div.article__text"));
static MORE: Lazy<Selector> = Lazy::new(|| css(".list-more[data-url]"));

pub struct Ria;

impl SiteParser for Ria {
    fn parse_listing(
        &self,
        html: &str,
        page_url: &Url,
    ) -> Result<Vec<Result<ListingItem, ParseError>>, ParseError> {
        page::parse_listing_with(
            html,
            page_url,
            &ListingRules {
                item: &ITEM,
                title: &TITLE,
                link: &TITLE,
                time: &TIME,
            },
        )
    }

    fn body_selector(&self) -> &Selector {
        &BODY
    }

    fn next_page(&self, html: &str, page_url: &Url) -> Option<Url> {
        let more = {
            let document = Html::parse_document(html);
            document
                .select(&MORE)
                .filter_map(|el| el.value().attr("data-url"))
                .map(str::to_string)
                .next()
        };
        match more {
            Some(href) => page_url.join(&href).ok(),
            None => page::rel_next(html, page_url),
        }
    }
}
