//! Website research: crawl a company site, then run a DAG of analysis stages
//! over a shared research record.

pub mod artifacts;
pub mod config;
pub mod crawlers;
pub mod error;
pub mod filter;
pub mod llm;
pub mod parsers;
pub mod pipeline;
pub mod research;
pub mod results;
pub mod server;
pub mod stages;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::{CrawlConfig, KeywordConfig, LlmConfig, ResearchConfig};
pub use crawlers::{Crawler, SiteCrawler, WebDriverCrawler, crawl_site};
pub use error::{CrawlError, FetchError, LlmError, PipelineError, ServerError, StageError};
pub use pipeline::{MergePolicy, Pipeline, ResearchState, Stage, StageGraph, StateSchema, StateUpdate};
pub use research::{Researcher, research};
pub use results::{CrawlResult, PageRecord, ScrapedSummary};
