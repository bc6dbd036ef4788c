use thiserror::Error;

/// Failures that stop a crawl before it produces any pages
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("invalid start URL '{0}': {1}")]
    InvalidStartUrl(String, url::ParseError),

    #[error("no crawl target provided")]
    MissingTarget,

    #[error("failed to start renderer at {url}: {reason}")]
    Renderer { url: String, reason: String },
}

/// Failure to fetch a single page
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("could not read page source for {url}: {reason}")]
    Source { url: String, reason: String },

    #[error("no browser session available: {0}")]
    Session(String),

    #[error("browser session lost while loading {url}: {reason}")]
    SessionLost { url: String, reason: String },

    #[error("fetch task failed: {0}")]
    Task(String),
}

/// Errors from the hosted language model
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("missing API key for the language model")]
    MissingApiKey,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("empty response from model")]
    Empty,

    #[error("no JSON found in model response")]
    NoJson,

    #[error("invalid JSON in model response: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised inside an analysis stage
#[derive(Error, Debug)]
pub enum StageError {
    #[error("missing input '{0}'")]
    MissingInput(&'static str),

    #[error("invalid input '{field}': {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error(transparent)]
    Crawl(#[from] CrawlError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("unexpected response shape: {0}")]
    Shape(String),
}

/// Errors building a stage graph
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PipelineError {
    #[error("stage '{0}' is declared more than once")]
    DuplicateStage(String),

    #[error("stage '{stage}' depends on unknown stage '{dependency}'")]
    UnknownDependency { stage: String, dependency: String },

    #[error("stage graph has a cycle through: {0:?}")]
    Cycle(Vec<String>),
}

/// Errors loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors returned by the HTTP API
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Research(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

impl axum::response::IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            ServerError::InvalidRequest(_) => http::StatusCode::BAD_REQUEST,
            _ => http::StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = axum::Json(serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));
        (status, body).into_response()
    }
}
