//! RBC section scraper.
//!
//! Section pages list stories as `div.item__wrap` blocks with absolute links.
//! The category/time line lives in `.item__bottom .item__category`.

use super::page::{self, ListingRules, css};
use super::{ListingItem, SiteParser};
use crate::error::ParseError;
use once_cell::sync::Lazy;
use scraper::Selector;
use url::Url;

static ITEM: Lazy<Selector> = Lazy::new(|| css("div.item__wrap"));
static TITLE: Lazy<Selector> = Lazy::new(|| css("span.normal-wrap, span.item__title"));
static LINK: Lazy<Selector> = Lazy::new(|| css("a.item__link[href]"));
static TIME: Lazy<Selector> = Lazy::new(|| css(".item__bottom .item__category"));
static BODY: Lazy<Selector> = Lazy::new(|| css("div.article__text p"));

pub struct Rbc;

impl SiteParser for Rbc {
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
                link: &LINK,
                time: &TIME,
            },
        )
    }

    fn body_selector(&self) -> &Selector {
        &BODY
    }
}
