//! Listing-page traversal shared by the stock sites.
//!
//! For each entry URL the walk fetches up to `max_pages` listing pages,
//! splitting each into [`ListingItem`]s. Items are handed out one at a time
//! and each item's article page, which carries the body, is fetched just
//! before the item is yielded, so nothing is fetched ahead of demand.
//!
//! Failure scopes:
//! - a bad listing item, or an article page that fails, is [`Extracted::Failed`]
//! - a listing page that fails is [`Extracted::Failed`] and ends that entry URL
//! - when every entry URL failed before any listing page was read, the last
//!   failure is [`Extracted::SourceFailed`]

use super::page::{self, ArticlePage};
use super::{Extracted, Extractor, ListingItem, SiteParser};
use crate::config::ExtractorDescriptor;
use crate::error::{ConfigError, ExtractError, ParseError};
use crate::fetch::FetchClient;
use crate::models::{RawArticle, fields};
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// [`Extractor`] that walks listing pages with a [`SiteParser`].
pub struct ListingExtractor<P> {
    site_id: String,
    entry_urls: Vec<Url>,
    timeout: Duration,
    max_pages: usize,
    parser: P,
}

impl<P: SiteParser> ListingExtractor<P> {
    pub fn new(descriptor: &ExtractorDescriptor, parser: P) -> Result<Self, ConfigError> {
        Ok(Self {
            site_id: descriptor.site_id.clone(),
            entry_urls: descriptor.parsed_entry_urls()?,
            timeout: descriptor.timeout(),
            max_pages: descriptor.max_pages.max(1),
            parser,
        })
    }
}

impl<P: SiteParser> Extractor for ListingExtractor<P> {
    fn site_id(&self) -> &str {
        &self.site_id
    }

    fn articles<'a>(&'a self, client: &'a dyn FetchClient) -> BoxStream<'a, Extracted> {
        let walk = Walk {
            extractor: self,
            client,
            entries: self.entry_urls.iter().cloned().collect(),
            next_page: None,
            pending: VecDeque::new(),
            listing_read: false,
        };

        stream::unfold(walk, |mut walk| async move {
            let event = walk.next_event().await?;
            Some((event, walk))
        })
        .boxed()
    }
}

/// Cursor over one walk of a site.
struct Walk<'a, P> {
    extractor: &'a ListingExtractor<P>,
    client: &'a dyn FetchClient,
    entries: VecDeque<Url>,
    /// Next listing page of the current entry URL and its 1-based number.
    next_page: Option<(Url, usize)>,
    pending: VecDeque<Result<ListingItem, ParseError>>,
    listing_read: bool,
}

impl<P: SiteParser> Walk<'_, P> {
    async fn next_event(&mut self) -> Option<Extracted> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(match item {
                    Ok(item) => self.complete(item).await,
                    Err(e) => Extracted::Failed(e.into()),
                });
            }

            let (page_url, number) = self
                .next_page
                .take()
                .or_else(|| self.entries.pop_front().map(|url| (url, 1)))?;

            if let Err(e) = self.read_listing(&page_url, number).await {
                let site = &self.extractor.site_id;
                let exhausted = !self.listing_read && self.entries.is_empty();
                warn!(site = %site, url = %page_url, error = %e, "Listing page failed");
                return Some(if exhausted {
                    Extracted::SourceFailed(e)
                } else {
                    Extracted::Failed(e)
                });
            }
        }
    }

    async fn read_listing(&mut self, page_url: &Url, number: usize) -> Result<(), ExtractError> {
        let ex = self.extractor;
        let html = self
            .client
            .fetch(page_url.as_str(), Some(ex.timeout))
            .await?;

        let items = ex.parser.parse_listing(&html, page_url)?;
        if number < ex.max_pages {
            self.next_page = ex
                .parser
                .next_page(&html, page_url)
                .map(|next| (next, number + 1));
        }

        info!(
            site = %ex.site_id,
            url = %page_url,
            page = number,
            count = items.len(),
            "Indexed listing page"
        );
        self.listing_read = true;
        self.pending.extend(items);
        Ok(())
    }

    async fn complete(&self, item: ListingItem) -> Extracted {
        let ex = self.extractor;
        match self.client.fetch(item.url.as_str(), Some(ex.timeout)).await {
            Ok(html) => {
                let page = page::parse_article(&html, ex.parser.body_selector());
                debug!(site = %ex.site_id, url = %item.url, "Scraped article page");
                Extracted::Article(raw_article(item, page))
            }
            Err(e) => Extracted::Failed(e.into()),
        }
    }
}

/// Merge listing and article-page fields. The listing title wins, the
/// article page's machine-readable time wins over the listing's text.
fn raw_article(item: ListingItem, page: ArticlePage) -> RawArticle {
    RawArticle::new()
        .with(fields::TITLE, Some(item.title).or(page.title))
        .with(fields::URL, Some(item.url.to_string()))
        .with(fields::PUBLISHED_AT, page.published.or(item.published))
        .with(fields::SUMMARY, page.summary)
        .with(fields::BODY, page.body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserKind;
    use crate::fetch::testing::ScriptedFetcher;
    use crate::scrapers::page::{ListingRules, css};
    use once_cell::sync::Lazy;
    use scraper::Selector;

    static ITEM: Lazy<Selector> = Lazy::new(|| css("li"));
    static LINK: Lazy<Selector> = Lazy::new(|| css("a[href]"));
    static TIME: Lazy<Selector> = Lazy::new(|| css("span"));
    static BODY: Lazy<Selector> = Lazy::new(|| css("p"));

    struct TestSite;

    impl SiteParser for TestSite {
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
                    title: &LINK,
                    link: &LINK,
                    time: &TIME,
                },
            )
        }

        fn body_selector(&self) -> &Selector {
            &BODY
        }
    }

    fn extractor(entries: &[&str], max_pages: usize) -> ListingExtractor<TestSite> {
        let mut descriptor = ExtractorDescriptor::new("Test", ParserKind::Rbc, entries[0]);
        descriptor.entry_urls = entries.iter().map(|s| s.to_string()).collect();
        descriptor.max_pages = max_pages;
        ListingExtractor::new(&descriptor, TestSite).unwrap()
    }

    const LISTING: &str = r#"<ul>
        <li><a href="/a/1">One</a><span>14.10.2024 09:30</span></li>
        <li><span>no link here</span></li>
        <li><a href="/a/2">Two</a></li>
    </ul>
    <a rel="next" href="/list?page=2">next</a>"#;

    #[tokio::test]
    async fn test_walk_yields_items_in_listing_order() {
        let fetcher = ScriptedFetcher::new()
            .page("https://s/list", LISTING)
            .page("https://s/a/1", "<p>Body one</p>")
            .failing("https://s/a/2");
        let ex = extractor(&["https://s/list"], 1);

        let events: Vec<Extracted> = ex.articles(&fetcher).collect().await;
        assert_eq!(events.len(), 3);

        let Extracted::Article(first) = &events[0] else {
            panic!("expected article, got {:?}", events[0]);
        };
        assert_eq!(first.get(fields::TITLE), Some("One"));
        assert_eq!(first.get(fields::URL), Some("https://s/a/1"));
        assert_eq!(first.get(fields::BODY), Some("Body one"));
        assert_eq!(first.get(fields::PUBLISHED_AT), Some("14.10.2024 09:30"));

        assert!(matches!(events[1], Extracted::Failed(ExtractError::Parse(_))));
        assert!(matches!(events[2], Extracted::Failed(ExtractError::Fetch(_))));

        // max_pages = 1: the rel=next link is never followed
        assert_eq!(
            fetcher.calls(),
            vec!["https://s/list", "https://s/a/1", "https://s/a/2"]
        );
    }

    #[tokio::test]
    async fn test_walk_follows_pagination_up_to_max_pages() {
        let fetcher = ScriptedFetcher::new()
            .page("https://s/list", LISTING)
            .page(
                "https://s/list?page=2",
                r#"<li><a href="/a/3">Three</a></li><a rel="next" href="/list?page=3">n</a>"#,
            )
            .page("https://s/a/1", "<p>1</p>")
            .page("https://s/a/2", "<p>2</p>")
            .page("https://s/a/3", "<p>3</p>");
        let ex = extractor(&["https://s/list"], 2);

        let titles: Vec<String> = ex
            .articles(&fetcher)
            .filter_map(|e| async move {
                match e {
                    Extracted::Article(raw) => raw.get(fields::TITLE).map(str::to_string),
                    _ => None,
                }
            })
            .collect()
            .await;
        assert_eq!(titles, vec!["One", "Two", "Three"]);
        assert!(!fetcher.calls().contains(&"https://s/list?page=3".to_string()));
    }

    #[tokio::test]
    async fn test_unreachable_entry_is_a_source_failure() {
        let fetcher = ScriptedFetcher::new().failing("https://s/list");
        let ex = extractor(&["https://s/list"], 1);
        let events: Vec<Extracted> = ex.articles(&fetcher).collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Extracted::SourceFailed(ExtractError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_one_bad_entry_among_several_is_not_a_source_failure() {
        let fetcher = ScriptedFetcher::new()
            .failing("https://s/broken")
            .page("https://s/list", LISTING)
            .page("https://s/a/1", "<p>1</p>")
            .page("https://s/a/2", "<p>2</p>");
        let ex = extractor(&["https://s/broken", "https://s/list"], 1);
        let events: Vec<Extracted> = ex.articles(&fetcher).collect().await;
        assert!(matches!(events[0], Extracted::Failed(_)));
        assert!(!events.iter().any(|e| matches!(e, Extracted::SourceFailed(_))));
        assert_eq!(
            events.iter().filter(|e| matches!(e, Extracted::Article(_))).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_page_without_items_is_a_parse_failure() {
        let fetcher = ScriptedFetcher::new().page("https://s/list", "<html>maintenance</html>");
        let ex = extractor(&["https://s/list"], 1);
        let events: Vec<Extracted> = ex.articles(&fetcher).collect().await;
        assert!(matches!(events[..], [Extracted::SourceFailed(ExtractError::Parse(_))]));
    }

    #[tokio::test]
    async fn test_articles_restarts_from_the_entry_urls() {
        let fetcher = ScriptedFetcher::new()
            .page("https://s/list", LISTING)
            .page("https://s/a/1", "<p>1</p>");
        let ex = extractor(&["https://s/list"], 1);
        let first: Vec<Extracted> = ex.articles(&fetcher).collect().await;
        let second: Vec<Extracted> = ex.articles(&fetcher).collect().await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_every_yielded_article_carries_a_body() {
        let fetcher = ScriptedFetcher::new()
            .page("https://s/list", LISTING)
            .page("https://s/a/1", "<p>Body one</p>")
            .page("https://s/a/2", "<p>Body two</p>");
        let ex = extractor(&["https://s/list"], 1);

        let records: Vec<_> = ex
            .articles(&fetcher)
            .filter_map(|e| async move {
                match e {
                    Extracted::Article(raw) => Some(raw),
                    _ => None,
                }
            })
            .map(|raw| crate::transform::validate(&raw, "Test"))
            .collect()
            .await;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(Result::is_ok));
    }

    #[tokio::test]
    async fn test_page_time_with_offset_overrides_naive_listing_time() {
        let fetcher = ScriptedFetcher::new()
            .page("https://s/list", LISTING)
            .page(
                "https://s/a/1",
                r#"<meta property="article:published_time" content="2024-10-14T09:30:00+03:00"><p>Body</p>"#,
            );
        let ex = extractor(&["https://s/list"], 1);

        let events: Vec<Extracted> = ex.articles(&fetcher).take(1).collect().await;
        let Extracted::Article(raw) = &events[0] else {
            panic!("expected article, got {:?}", events[0]);
        };
        let record = crate::transform::validate(raw, "Test").unwrap();
        assert_eq!(
            record.published_at().map(|ts| ts.to_rfc3339()),
            Some("2024-10-14T06:30:00+00:00".to_string())
        );
    }
}
