use crate::config::CrawlConfig;
use crate::crawlers::fetcher::{PageFetcher, WebDriverFetcher, fetch_with_retry};
use crate::crawlers::frontier::Frontier;
use crate::error::{CrawlError, FetchError};
use crate::parsers::{self, LinkScan};
use crate::results::{CrawlResult, PageRecord};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use url::Url;

/// Anything that can turn a site address into aggregated content
#[async_trait]
pub trait SiteCrawler: Send + Sync {
    async fn crawl(&self, target: &str) -> Result<CrawlResult, CrawlError>;
}

/// Opens fresh WebDriver sessions for every crawl
#[derive(Debug, Clone)]
pub struct WebDriverCrawler {
    config: CrawlConfig,
}

impl WebDriverCrawler {
    pub fn new(config: CrawlConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SiteCrawler for WebDriverCrawler {
    async fn crawl(&self, target: &str) -> Result<CrawlResult, CrawlError> {
        crawl_site(&self.config, target).await
    }
}

#[async_trait]
impl SiteCrawler for Crawler {
    async fn crawl(&self, target: &str) -> Result<CrawlResult, CrawlError> {
        Crawler::crawl(self, target).await
    }
}

/// Crawls a website with a headless browser and aggregates the extracted content.
///
/// Connects to the WebDriver configured in `config`, runs a breadth-first crawl
/// from `start_url` and closes every browser session before returning.
pub async fn crawl_site(config: &CrawlConfig, start_url: &str) -> Result<CrawlResult, CrawlError> {
    ::log::info!("Starting web crawler for: {}", start_url);
    let fetcher = Arc::new(WebDriverFetcher::connect(config).await?);
    let result = Crawler::new(fetcher.clone(), config.clone())
        .crawl(start_url)
        .await;
    fetcher.close().await;
    result
}

/// Prefixes `https://` when the input has no scheme
pub fn ensure_scheme(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// What one fetch task produced
enum PageOutcome {
    Page {
        record: PageRecord,
        links: LinkScan,
        load_time: f64,
    },
    Failed(FetchError),
}

/// Breadth-first crawler over any [`PageFetcher`].
///
/// URLs are processed in batches of at most `concurrency_limit`. A batch is
/// fully finished before the next one is taken from the queue, and a URL is
/// marked visited before its fetch starts.
pub struct Crawler {
    fetcher: Arc<dyn PageFetcher>,
    config: CrawlConfig,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: CrawlConfig) -> Self {
        Self { fetcher, config }
    }

    /// Crawl from `start_url` until the queue is empty or `max_pages` pages are collected
    pub async fn crawl(&self, start_url: &str) -> Result<CrawlResult, CrawlError> {
        if start_url.trim().is_empty() {
            return Err(CrawlError::MissingTarget);
        }
        let website_url = ensure_scheme(start_url);
        let root = Url::parse(&website_url)
            .map_err(|e| CrawlError::InvalidStartUrl(website_url.clone(), e))?;

        let max_pages = self.config.max_pages;
        let concurrency = self.config.concurrency_limit.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut frontier = Frontier::new(&root);
        let filter = Arc::new(frontier.filter().clone());
        let mut pages: Vec<PageRecord> = Vec::new();
        let mut load_times: Vec<f64> = Vec::new();

        while !frontier.is_empty() && pages.len() < max_pages {
            let batch_size = concurrency
                .min(max_pages - pages.len())
                .min(frontier.queue_len());
            let batch = frontier.next_batch(batch_size);
            if batch.is_empty() {
                continue;
            }
            ::log::debug!(
                "Dispatching batch of {} URLs ({} collected, {} queued)",
                batch.len(),
                pages.len(),
                frontier.queue_len()
            );

            let handles: Vec<_> = batch
                .iter()
                .map(|link| {
                    let fetcher = Arc::clone(&self.fetcher);
                    let semaphore = Arc::clone(&semaphore);
                    let filter = Arc::clone(&filter);
                    let url = link.url.clone();
                    let attempts = self.config.retries;
                    let delay = self.config.retry_delay();
                    tokio::spawn(async move {
                        let _permit = match semaphore.acquire_owned().await {
                            Ok(permit) => permit,
                            Err(e) => return PageOutcome::Failed(FetchError::Task(e.to_string())),
                        };
                        match fetch_with_retry(fetcher.as_ref(), &url, attempts, delay).await {
                            Ok(fetched) => {
                                let (mut record, links) =
                                    parsers::extract_with_links(fetched.html.html(), &url, &filter);
                                record.partial = fetched.html.is_partial();
                                PageOutcome::Page {
                                    record,
                                    links,
                                    load_time: fetched.load_time.as_secs_f64(),
                                }
                            }
                            Err(e) => PageOutcome::Failed(e),
                        }
                    })
                })
                .collect();

            for (link, joined) in batch.iter().zip(join_all(handles).await) {
                let outcome = joined
                    .unwrap_or_else(|e| PageOutcome::Failed(FetchError::Task(e.to_string())));
                match outcome {
                    PageOutcome::Page {
                        record,
                        links,
                        load_time,
                    } => {
                        ::log::info!("Scraped {} ({} links)", link.url, links.accepted.len());
                        for rejected in links.rejected {
                            frontier.reject(rejected);
                        }
                        for discovered in links.accepted {
                            if pages.len() + 1 + frontier.queue_len() >= max_pages {
                                break;
                            }
                            frontier.enqueue(discovered);
                        }
                        pages.push(record);
                        load_times.push(load_time);
                    }
                    PageOutcome::Failed(e) => {
                        ::log::error!("Failed to scrape {}: {}", link.url, e);
                        frontier.reject(link.url.to_string());
                    }
                }
            }
        }

        ::log::info!(
            "Crawl of {} finished: {} pages collected, {} URLs visited, {} rejected",
            website_url,
            pages.len(),
            frontier.visited_len(),
            frontier.rejected().len()
        );
        Ok(CrawlResult::aggregate(
            website_url,
            pages,
            &load_times,
            frontier.into_rejected(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawlers::fetcher::FetchedHtml;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves fixed HTML per URL and records every fetch attempt
    #[derive(Default)]
    struct FixtureFetcher {
        pages: HashMap<String, String>,
        partial: Vec<String>,
        attempts: Mutex<Vec<String>>,
    }

    impl FixtureFetcher {
        fn page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }

        fn partial(mut self, url: &str, html: &str) -> Self {
            self.partial.push(url.to_string());
            self.page(url, html)
        }

        fn attempts_for(&self, url: &str) -> usize {
            self.attempts
                .lock()
                .unwrap()
                .iter()
                .filter(|u| u.as_str() == url)
                .count()
        }

        /// Number of distinct URLs the crawler tried to fetch
        fn visited(&self) -> usize {
            let mut urls = self.attempts.lock().unwrap().clone();
            urls.sort();
            urls.dedup();
            urls.len()
        }
    }

    #[async_trait]
    impl PageFetcher for FixtureFetcher {
        async fn fetch(&self, url: &Url) -> Result<FetchedHtml, FetchError> {
            self.attempts.lock().unwrap().push(url.to_string());
            match self.pages.get(url.as_str()) {
                Some(html) if self.partial.contains(&url.to_string()) => {
                    Ok(FetchedHtml::Partial(html.clone()))
                }
                Some(html) => Ok(FetchedHtml::Full(html.clone())),
                None => Err(FetchError::Navigation {
                    url: url.to_string(),
                    reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
                }),
            }
        }
    }

    fn config(max_pages: usize) -> CrawlConfig {
        CrawlConfig {
            max_pages,
            concurrency_limit: 4,
            retry_delay_ms: 1,
            ..CrawlConfig::default()
        }
    }

    fn three_page_site() -> FixtureFetcher {
        FixtureFetcher::default()
            .page(
                "https://example.com/",
                r#"<html><body><h1>Example Co</h1>
                <p>We build tools for teams who ship every day.</p>
                <a href="/about">About</a> <a href="/blog/post-1">Post</a></body></html>"#,
            )
            .page(
                "https://example.com/about",
                r#"<html><body><h2>About us</h2><a href="/">Home</a></body></html>"#,
            )
            .page(
                "https://example.com/blog/post-1",
                r#"<html><body><article><h1>First post</h1>
                <p>This is the body of our very first blog post.</p></article>
                <a href="/about">About</a></body></html>"#,
            )
    }

    #[tokio::test]
    async fn test_crawls_every_reachable_page() {
        let fetcher = Arc::new(three_page_site());
        let crawler = Crawler::new(fetcher, config(100));
        let result = crawler.crawl("example.com").await.unwrap();

        assert_eq!(result.website_url, "https://example.com");
        assert_eq!(result.total_pages, 3);
        assert_eq!(result.blogs.len(), 1);
        assert!(result.blogs[0].url.ends_with("/blog/post-1"));
        assert_eq!(result.blogs[0].title, "First post");
        assert!(result.rejected_urls.is_empty());
        assert!(result.average_load_time_seconds >= 0.0);
    }

    #[tokio::test]
    async fn test_failed_url_rejected_once_after_retries() {
        let fetcher = Arc::new(FixtureFetcher::default().page(
            "https://example.com/",
            r#"<a href="/missing">Gone</a> <a href="/missing#part">Gone again</a>"#,
        ));
        let crawler = Crawler::new(fetcher.clone(), config(100));
        let result = crawler.crawl("https://example.com").await.unwrap();

        assert_eq!(result.total_pages, 1);
        assert_eq!(result.rejected_urls, vec!["https://example.com/missing"]);
        assert!(result.pages.iter().all(|p| !p.url.ends_with("/missing")));
        assert_eq!(fetcher.attempts_for("https://example.com/missing"), 2);
        assert_eq!(fetcher.visited(), 2);
        assert!(fetcher.visited() > result.total_pages);
    }

    #[tokio::test]
    async fn test_max_pages_bound() {
        let mut fetcher = FixtureFetcher::default();
        let links: String = (0..20)
            .map(|i| format!(r#"<a href="/page-{i}">Page {i}</a>"#))
            .collect();
        fetcher = fetcher.page("https://example.com/", &links);
        for i in 0..20 {
            fetcher = fetcher.page(&format!("https://example.com/page-{i}"), &links);
        }

        let fetcher = Arc::new(fetcher);
        let crawler = Crawler::new(fetcher.clone(), config(5));
        let result = crawler.crawl("https://example.com").await.unwrap();
        assert_eq!(result.total_pages, 5);
        assert_eq!(result.pages.len(), 5);
        assert!(fetcher.visited() >= result.total_pages);
    }

    #[tokio::test]
    async fn test_each_page_fetched_once() {
        let fetcher = Arc::new(three_page_site());
        let crawler = Crawler::new(fetcher.clone(), config(100));
        crawler.crawl("https://example.com").await.unwrap();

        let attempts = fetcher.attempts.lock().unwrap().clone();
        let mut unique = attempts.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(attempts.len(), unique.len());
    }

    #[tokio::test]
    async fn test_partial_pages_are_kept() {
        let fetcher = Arc::new(
            FixtureFetcher::default().partial("https://example.com/", "<h1>Slow site</h1>"),
        );
        let crawler = Crawler::new(fetcher, config(10));
        let result = crawler.crawl("https://example.com").await.unwrap();
        assert_eq!(result.total_pages, 1);
        assert!(result.pages[0].partial);
        assert_eq!(result.headings.h1, vec!["Slow site"]);
    }

    #[tokio::test]
    async fn test_filtered_links_are_rejected() {
        let fetcher = Arc::new(FixtureFetcher::default().page(
            "https://example.com/",
            r#"<a href="https://other.org/">Other</a> <a href="/deck.pdf">Deck</a>"#,
        ));
        let crawler = Crawler::new(fetcher, config(10));
        let result = crawler.crawl("https://example.com").await.unwrap();
        assert_eq!(result.total_pages, 1);
        assert!(result.rejected_urls.contains(&"https://other.org/".to_string()));
        assert!(result.rejected_urls.contains(&"https://example.com/deck.pdf".to_string()));
    }

    #[tokio::test]
    async fn test_empty_target() {
        let crawler = Crawler::new(Arc::new(FixtureFetcher::default()), config(10));
        assert!(matches!(
            crawler.crawl("  ").await,
            Err(CrawlError::MissingTarget)
        ));
    }

    #[test]
    fn test_ensure_scheme() {
        assert_eq!(ensure_scheme("example.com"), "https://example.com");
        assert_eq!(ensure_scheme("http://example.com"), "http://example.com");
    }
}
