use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the web crawler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Maximum number of pages to collect
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Maximum number of simultaneous page fetches
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Page load timeout in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Fetch attempts per URL before it is rejected
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// Pause between fetch attempts in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// User agent sent by the browser
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Block image, style, script, font and media loads
    #[serde(default = "default_true")]
    pub block_resources: bool,

    /// Run the browser without a window
    #[serde(default = "default_true")]
    pub headless: bool,
}

/// Configuration for the hosted language model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key (usually from GOOGLE_API_KEY)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Per-call timeout in seconds
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

/// Bounds for the keyword research stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordConfig {
    #[serde(default = "default_min_keywords")]
    pub min_keywords: usize,

    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,

    /// Score given to filler keywords
    #[serde(default = "default_ranking_score")]
    pub default_ranking_score: i64,
}

/// Top-level configuration for a research run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default)]
    pub crawl: CrawlConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub keywords: KeywordConfig,

    /// Directory for JSON snapshots; `None` disables them
    #[serde(default = "default_output_dir")]
    pub output_dir: Option<PathBuf>,
}

impl ResearchConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Override settings from the environment (WEBDRIVER_URL, GOOGLE_API_KEY,
    /// SITESCOPE_OUTPUT_DIR)
    pub fn apply_env(mut self) -> Self {
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                self.crawl.webdriver_url = webdriver_url;
            }
        }
        if let Ok(key) = std::env::var("GOOGLE_API_KEY") {
            if !key.is_empty() {
                self.llm.api_key = Some(key);
            }
        }
        if let Ok(dir) = std::env::var("SITESCOPE_OUTPUT_DIR") {
            if !dir.is_empty() {
                self.output_dir = Some(PathBuf::from(dir));
            }
        }
        self
    }
}

impl CrawlConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            crawl: CrawlConfig::default(),
            llm: LlmConfig::default(),
            keywords: KeywordConfig::default(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            concurrency_limit: default_concurrency_limit(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            webdriver_url: default_webdriver_url(),
            user_agent: default_user_agent(),
            block_resources: true,
            headless: true,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_llm_base_url(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            min_keywords: default_min_keywords(),
            max_keywords: default_max_keywords(),
            default_ranking_score: default_ranking_score(),
        }
    }
}

fn default_max_pages() -> usize {
    100
}

fn default_concurrency_limit() -> usize {
    20
}

fn default_fetch_timeout_secs() -> u64 {
    20
}

fn default_retries() -> usize {
    2
}

fn default_retry_delay_ms() -> u64 {
    100
}

/// Default value for webdriver_url
fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36"
        .to_string()
}

fn default_true() -> bool {
    true
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_llm_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_temperature() -> f32 {
    0.4
}

fn default_max_output_tokens() -> u32 {
    8192
}

fn default_llm_timeout_secs() -> u64 {
    120
}

fn default_min_keywords() -> usize {
    50
}

fn default_max_keywords() -> usize {
    60
}

fn default_ranking_score() -> i64 {
    50
}

fn default_output_dir() -> Option<PathBuf> {
    Some(PathBuf::from("output"))
}
