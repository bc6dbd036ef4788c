use crate::config::CrawlConfig;
use crate::error::{CrawlError, FetchError};
use async_trait::async_trait;
use fantoccini::error::CmdError;
use fantoccini::wd::{TimeoutConfiguration, WebDriverCompatibleCommand};
use fantoccini::{Client, ClientBuilder};
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;

/// URL patterns blocked at the network layer when resource blocking is on
pub const BLOCKED_RESOURCE_PATTERNS: &[&str] = &[
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.webp", "*.svg", "*.ico", "*.css", "*.js", "*.woff",
    "*.woff2", "*.ttf", "*.mp4", "*.webm", "*.mp3",
];

const FALLBACK_WEBDRIVER_URLS: &[&str] = &[
    "http://localhost:9515", // ChromeDriver default
    "http://127.0.0.1:4444",
];

/// Rendered HTML for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchedHtml {
    /// The page finished loading
    Full(String),
    /// The load timed out; this is whatever the renderer had so far
    Partial(String),
}

impl FetchedHtml {
    pub fn html(&self) -> &str {
        match self {
            FetchedHtml::Full(html) | FetchedHtml::Partial(html) => html,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, FetchedHtml::Partial(_))
    }
}

/// A successful fetch with its timing
#[derive(Debug, Clone)]
pub struct Fetched {
    pub html: FetchedHtml,
    pub load_time: Duration,
}

/// Something that can render a page and hand back its HTML
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a single URL once. Retries are handled by the caller.
    async fn fetch(&self, url: &Url) -> Result<FetchedHtml, FetchError>;
}

/// Fetches `url` up to `attempts` times, pausing `delay` between attempts.
///
/// Exhausting the attempts returns the last error as a value so the caller can
/// keep going with the rest of its batch.
pub async fn fetch_with_retry(
    fetcher: &dyn PageFetcher,
    url: &Url,
    attempts: usize,
    delay: Duration,
) -> Result<Fetched, FetchError> {
    let attempts = attempts.max(1);
    let mut last_error = FetchError::Task(format!("no fetch attempted for {url}"));

    for attempt in 1..=attempts {
        let start = Instant::now();
        match fetcher.fetch(url).await {
            Ok(html) => {
                return Ok(Fetched {
                    html,
                    load_time: start.elapsed(),
                });
            }
            Err(e) => {
                ::log::warn!("Error fetching {} (attempt {}/{}): {}", url, attempt, attempts, e);
                last_error = e;
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(last_error)
}

/// Chrome DevTools command sent through ChromeDriver's CDP passthrough
#[derive(Debug)]
struct CdpCommand {
    cmd: &'static str,
    params: serde_json::Value,
}

impl WebDriverCompatibleCommand for CdpCommand {
    fn endpoint(
        &self,
        base_url: &url::Url,
        session_id: Option<&str>,
    ) -> Result<url::Url, url::ParseError> {
        base_url.join(&format!(
            "session/{}/goog/cdp/execute",
            session_id.unwrap_or_default()
        ))
    }

    fn method_and_body(&self, _request_url: &url::Url) -> (http::Method, Option<String>) {
        let body = json!({ "cmd": self.cmd, "params": self.params });
        (http::Method::POST, Some(body.to_string()))
    }
}

/// Page fetcher backed by a pool of WebDriver browser sessions.
///
/// Sessions are opened lazily, reused across fetches and never shared by two
/// fetches at once.
pub struct WebDriverFetcher {
    config: CrawlConfig,
    idle: Mutex<Vec<Client>>,
}

impl WebDriverFetcher {
    /// Opens the first browser session, falling back to the usual local driver
    /// ports. Failing here means the renderer is unavailable.
    pub async fn connect(config: &CrawlConfig) -> Result<Self, CrawlError> {
        let mut config = config.clone();
        let reason = match open_session(&config).await {
            Ok(client) => {
                ::log::info!("Connected to WebDriver at {}", config.webdriver_url);
                return Ok(Self::with_session(config, client));
            }
            Err(reason) => reason,
        };
        ::log::error!(
            "Failed to connect to WebDriver at {}: {}",
            config.webdriver_url,
            reason
        );

        let requested = config.webdriver_url.clone();
        for url in FALLBACK_WEBDRIVER_URLS {
            if *url == requested {
                continue;
            }
            ::log::info!("Trying fallback WebDriver URL: {}", url);
            config.webdriver_url = url.to_string();
            if let Ok(client) = open_session(&config).await {
                ::log::info!("Connected to fallback WebDriver at {}", url);
                return Ok(Self::with_session(config, client));
            }
        }

        ::log::error!(
            "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
        );
        Err(CrawlError::Renderer {
            url: requested,
            reason,
        })
    }

    fn with_session(config: CrawlConfig, client: Client) -> Self {
        Self {
            config,
            idle: Mutex::new(vec![client]),
        }
    }

    /// Closes every pooled session
    pub async fn close(&self) {
        let clients: Vec<Client> = self.idle.lock().await.drain(..).collect();
        for client in clients {
            if let Err(e) = client.close().await {
                ::log::warn!("Failed to close WebDriver session: {}", e);
            }
        }
    }

    async fn checkout(&self) -> Result<Client, FetchError> {
        if let Some(client) = self.idle.lock().await.pop() {
            return Ok(client);
        }
        ::log::debug!("Opening additional WebDriver session");
        open_session(&self.config).await.map_err(FetchError::Session)
    }

    async fn checkin(&self, client: Client) {
        self.idle.lock().await.push(client);
    }

    async fn render(&self, client: &Client, url: &Url) -> Result<FetchedHtml, FetchError> {
        let timed_out = navigation_outcome(url, client.goto(url.as_str()).await)?;
        if timed_out {
            ::log::warn!("Timeout on {}, capturing partial content", url);
        }

        let html = client.source().await.map_err(|e| match classify(&e) {
            Failure::SessionLost => FetchError::SessionLost {
                url: url.to_string(),
                reason: e.to_string(),
            },
            _ => FetchError::Source {
                url: url.to_string(),
                reason: e.to_string(),
            },
        })?;

        Ok(if timed_out {
            FetchedHtml::Partial(html)
        } else {
            FetchedHtml::Full(html)
        })
    }
}

#[async_trait]
impl PageFetcher for WebDriverFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedHtml, FetchError> {
        let client = self.checkout().await?;
        let result = self.render(&client, url).await;

        match &result {
            Err(FetchError::SessionLost { .. }) => {
                ::log::warn!("Dropping broken WebDriver session after {}", url);
                let _ = client.close().await;
            }
            _ => self.checkin(client).await,
        }
        result
    }
}

async fn open_session(config: &CrawlConfig) -> Result<Client, String> {
    let mut args = vec![
        "--disable-gpu".to_string(),
        "--no-sandbox".to_string(),
        format!("--user-agent={}", config.user_agent),
    ];
    if config.headless {
        args.push("--headless=new".to_string());
    }
    if config.block_resources {
        args.push("--blink-settings=imagesEnabled=false".to_string());
    }

    let mut capabilities = serde_json::Map::new();
    capabilities.insert("goog:chromeOptions".to_string(), json!({ "args": args }));

    let client = ClientBuilder::native()
        .capabilities(capabilities)
        .connect(&config.webdriver_url)
        .await
        .map_err(|e| e.to_string())?;

    let timeouts = TimeoutConfiguration::new(None, Some(config.fetch_timeout()), None);
    client
        .update_timeouts(timeouts)
        .await
        .map_err(|e| e.to_string())?;

    if config.block_resources {
        block_resources(&client).await;
    }
    Ok(client)
}

/// Asks the browser to drop sub-resource requests. Drivers without CDP
/// passthrough keep loading everything.
async fn block_resources(client: &Client) {
    let enable = CdpCommand {
        cmd: "Network.enable",
        params: json!({}),
    };
    let block = CdpCommand {
        cmd: "Network.setBlockedURLs",
        params: json!({ "urls": BLOCKED_RESOURCE_PATTERNS }),
    };
    for command in [enable, block] {
        if let Err(e) = client.issue_cmd(command).await {
            ::log::debug!("Resource blocking unavailable: {}", e);
            return;
        }
    }
}

/// What a failed WebDriver command means for the page and its session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    Timeout,
    SessionLost,
    Other,
}

fn classify(error: &CmdError) -> Failure {
    if error.is_timeout() {
        Failure::Timeout
    } else if error.is_invalid_session_id()
        || error.is_no_such_window()
        || matches!(error, CmdError::Lost(_))
    {
        Failure::SessionLost
    } else {
        Failure::Other
    }
}

/// Whether navigation timed out with the page still usable for a partial capture
fn navigation_outcome(url: &Url, navigated: Result<(), CmdError>) -> Result<bool, FetchError> {
    let Err(e) = navigated else {
        return Ok(false);
    };
    match classify(&e) {
        Failure::Timeout => Ok(true),
        Failure::SessionLost => Err(FetchError::SessionLost {
            url: url.to_string(),
            reason: e.to_string(),
        }),
        Failure::Other => Err(FetchError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fantoccini::error::{ErrorStatus, WebDriver};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for Flaky {
        async fn fetch(&self, url: &Url) -> Result<FetchedHtml, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(FetchError::Navigation {
                    url: url.to_string(),
                    reason: "connection reset".to_string(),
                })
            } else {
                Ok(FetchedHtml::Full("<html></html>".to_string()))
            }
        }
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let fetcher = Flaky {
            failures: 1,
            calls: AtomicUsize::new(0),
        };
        let url = Url::parse("https://example.com").unwrap();
        let fetched = fetch_with_retry(&fetcher, &url, 2, Duration::from_millis(1)).await;
        assert!(fetched.is_ok());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_exhausted_returns_error() {
        let fetcher = Flaky {
            failures: 5,
            calls: AtomicUsize::new(0),
        };
        let url = Url::parse("https://example.com").unwrap();
        let fetched = fetch_with_retry(&fetcher, &url, 2, Duration::from_millis(1)).await;
        assert!(matches!(fetched, Err(FetchError::Navigation { .. })));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    fn driver_error(status: ErrorStatus, message: &'static str) -> Result<(), CmdError> {
        Err(CmdError::Standard(WebDriver::new(status, message)))
    }

    #[test]
    fn test_navigation_timeout_keeps_partial_page() {
        let url = Url::parse("https://example.com/slow").unwrap();
        assert!(!navigation_outcome(&url, Ok(())).unwrap());
        assert!(navigation_outcome(&url, driver_error(ErrorStatus::Timeout, "page load")).unwrap());
    }

    #[test]
    fn test_navigation_errors_by_status() {
        let url = Url::parse("https://example.com/").unwrap();
        let lost = navigation_outcome(&url, driver_error(ErrorStatus::InvalidSessionId, "gone"));
        assert!(matches!(lost, Err(FetchError::SessionLost { .. })));

        // the status decides, not the wording of the message
        let refused = navigation_outcome(
            &url,
            driver_error(ErrorStatus::UnknownError, "net::ERR_CONNECTION_TIMEOUT"),
        );
        assert!(matches!(refused, Err(FetchError::Navigation { .. })));
    }

    #[test]
    fn test_partial_html_flag() {
        let partial = FetchedHtml::Partial("<p>half".to_string());
        assert!(partial.is_partial());
        assert_eq!(partial.html(), "<p>half");
        assert!(!FetchedHtml::Full(String::new()).is_partial());
    }
}
