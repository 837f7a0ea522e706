//! HTML helpers shared by the site parsers.
//!
//! Everything here is synchronous and returns owned data, so a parsed
//! [`Html`] document never lives across an `.await`.

use super::ListingItem;
use crate::error::ParseError;
use crate::utils::normalize_whitespace;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Parse a CSS selector literal.
pub fn css(selector: &str) -> Selector {
    Selector::parse(selector).expect("static CSS selector")
}

static REL_NEXT: Lazy<Selector> = Lazy::new(|| css(r#"a[rel="next"][href], link[rel="next"][href]"#));
static OG_TITLE: Lazy<Selector> = Lazy::new(|| css(r#"meta[property="og:title"][content]"#));
static H1: Lazy<Selector> = Lazy::new(|| css("h1"));
static PUBLISHED_META: Lazy<Selector> = Lazy::new(|| {
    css(r#"meta[property="article:published_time"][content], meta[itemprop="datePublished"][content]"#)
});
static TIME_DATETIME: Lazy<Selector> = Lazy::new(|| css("time[datetime]"));
static DESCRIPTION: Lazy<Selector> = Lazy::new(|| {
    css(r#"meta[property="og:description"][content], meta[name="description"][content]"#)
});

/// Markup rules for a card-style listing page.
pub struct ListingRules<'a> {
    pub item: &'a Selector,
    pub title: &'a Selector,
    pub link: &'a Selector,
    pub time: &'a Selector,
}

/// Fields scraped from an article page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticlePage {
    pub title: Option<String>,
    pub published: Option<String>,
    pub summary: Option<String>,
    pub body: Option<String>,
}

/// Normalized text content of an element.
pub fn text_of(element: ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .map(text_of)
        .find(|text| !text.is_empty())
}

fn first_attr(document: &Html, selector: &Selector, attr: &str) -> Option<String> {
    document
        .select(selector)
        .filter_map(|el| el.value().attr(attr))
        .map(normalize_whitespace)
        .find(|value| !value.is_empty())
}

/// Split a listing page into items following `rules`.
///
/// An item without a title or link is reported as an `Err` entry; a page
/// without a single item is an error for the whole page.
pub fn parse_listing_with(
    html: &str,
    page_url: &Url,
    rules: &ListingRules<'_>,
) -> Result<Vec<Result<ListingItem, ParseError>>, ParseError> {
    let document = Html::parse_document(html);
    let items: Vec<_> = document
        .select(rules.item)
        .enumerate()
        .map(|(i, card)| parse_card(card, i, page_url, rules))
        .collect();

    if items.is_empty() {
        return Err(ParseError::new(page_url.as_str(), "no listing items found"));
    }
    Ok(items)
}

fn parse_card(
    card: ElementRef<'_>,
    index: usize,
    page_url: &Url,
    rules: &ListingRules<'_>,
) -> Result<ListingItem, ParseError> {
    let title = first_text(card, rules.title)
        .ok_or_else(|| ParseError::new(page_url.as_str(), format!("item {index}: no title")))?;

    let href = card
        .select(rules.link)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())
        .ok_or_else(|| ParseError::new(page_url.as_str(), format!("item {index}: no link")))?;

    let url = page_url.join(href).map_err(|e| {
        ParseError::new(page_url.as_str(), format!("item {index}: bad link {href}: {e}"))
    })?;

    Ok(ListingItem {
        title,
        url,
        published: first_text(card, rules.time),
    })
}

/// Follow `rel="next"` pagination links.
pub fn rel_next(html: &str, page_url: &Url) -> Option<Url> {
    let document = Html::parse_document(html);
    first_attr(&document, &REL_NEXT, "href").and_then(|href| page_url.join(&href).ok())
}

/// Scrape title, publication time, summary and body from an article page.
///
/// Machine-readable metadata is preferred over visible text:
/// - **title**: `og:title`, else the first `<h1>`
/// - **published**: `article:published_time` or `itemprop=datePublished`
///   meta, else `<time datetime>`
/// - **summary**: the first `og:description` or `description` meta
///
/// # Arguments
///
/// * `html` - Raw article page
/// * `body` - Site-specific selector for body paragraphs
///
/// # Returns
///
/// An [`ArticlePage`] whose missing parts are `None`. The body joins the
/// non-empty paragraphs with a blank line; never fails, since a page without
/// any of these is left for validation to reject.
pub fn parse_article(html: &str, body: &Selector) -> ArticlePage {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let paragraphs: Vec<String> = document
        .select(body)
        .map(text_of)
        .filter(|p| !p.is_empty())
        .collect();

    ArticlePage {
        title: first_attr(&document, &OG_TITLE, "content").or_else(|| first_text(root, &H1)),
        published: first_attr(&document, &PUBLISHED_META, "content")
            .or_else(|| first_attr(&document, &TIME_DATETIME, "datetime")),
        summary: first_attr(&document, &DESCRIPTION, "content"),
        body: (!paragraphs.is_empty()).then(|| paragraphs.join("\n\n")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_article_prefers_meta() {
        let html = r#"
            <html><head>
              <meta property="og:title" content="Meta title">
              <meta property="article:published_time" content="2024-10-14T12:30:00+03:00">
              <meta name="description" content="  Short   summary ">
            </head><body>
              <h1>Heading</h1>
              <div class="text"><p>First.</p><p>  </p><p>Second
                line.</p></div>
            </body></html>"#;
        let page = parse_article(html, &css("div.text p"));
        assert_eq!(page.title.as_deref(), Some("Meta title"));
        assert_eq!(page.published.as_deref(), Some("2024-10-14T12:30:00+03:00"));
        assert_eq!(page.summary.as_deref(), Some("Short summary"));
        assert_eq!(page.body.as_deref(), Some("First.\n\nSecond line."));
    }

    #[test]
    fn test_parse_article_fallbacks() {
        let html = r#"<html><body><h1> Heading </h1>
            <time datetime="2024-10-14">14 Oct</time></body></html>"#;
        let page = parse_article(html, &css("div.text p"));
        assert_eq!(page.title.as_deref(), Some("Heading"));
        assert_eq!(page.published.as_deref(), Some("2024-10-14"));
        assert_eq!(page.summary, None);
        assert_eq!(page.body, None);
    }

    #[test]
    fn test_rel_next_resolves_relative_link() {
        let base = Url::parse("https://site.example/news/").unwrap();
        let html = r#"<a rel="next" href="?page=2">More</a>"#;
        assert_eq!(
            rel_next(html, &base).unwrap().as_str(),
            "https://site.example/news/?page=2"
        );
        assert_eq!(rel_next("<p>end</p>", &base), None);
    }
}
