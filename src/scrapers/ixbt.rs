//! iXBT news feed scraper.
//!
//! `https://www.ixbt.com/news/` renders the day's news as `li.item` rows.
//! The headline is the row's plain link (not the comments counter) and its
//! site-relative path is resolved against the listing URL.

use super::page::{self, ListingRules, css};
use super::{ListingItem, SiteParser};
use crate::error::ParseError;
use once_cell::sync::Lazy;
use scraper::Selector;
use url::Url;

static ITEM: Lazy<Selector> = Lazy::new(|| css("li.item"));
static TITLE: Lazy<Selector> = Lazy::new(|| css("a[href]:not(.comments_link)"));
static TIME: Lazy<Selector> = Lazy::new(|| css("span.time_iteration_icon_light"));
static BODY: Lazy<Selector> = Lazy::new(|| css(r#"div[itemprop="articleBody"] p, div.b-article__content p"#));

pub struct Ixbt;

impl SiteParser for Ixbt {
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
}
