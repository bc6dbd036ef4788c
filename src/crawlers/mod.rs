//! Website crawling: page fetching, per-crawl URL state and the breadth-first crawl loop.

pub mod fetcher;
pub mod frontier;
pub mod web;

pub use fetcher::{FetchedHtml, PageFetcher, WebDriverFetcher};
pub use web::{Crawler, SiteCrawler, WebDriverCrawler, crawl_site, ensure_scheme};
