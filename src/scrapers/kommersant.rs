//! Kommersant rubric scraper.
//!
//! Rubric pages such as `https://www.kommersant.ru/hitech` list stories as
//! `article.uho` cards. Links are site-relative (`/doc/1234567`) and are
//! resolved against the listing page URL.

use super::page::{self, ListingRules, css};
use super::{ListingItem, SiteParser};
use crate::error::ParseError;
use once_cell::sync::Lazy;
use scraper::Selector;
use url::Url;

static ITEM: Lazy<Selector> = Lazy::new(|| css("article.uho, article.rubric_lenta__item"));
static TITLE: Lazy<Selector> = Lazy::new(|| css("span.vam"));
static LINK: Lazy<Selector> = Lazy::new(|| css("a.uho__link[href]"));
static TIME: Lazy<Selector> = Lazy::new(|| css("p.uho__tag, p.rubric_lenta__item_tag"));
static BODY: Lazy<Selector> = Lazy::new(|| css("div.doc__body p.doc__text, div.article_text_wrapper p"));

pub struct Kommersant;

impl SiteParser for Kommersant {
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
