use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use url::Url;

/// Extensions of binary and static assets that are never crawled
pub const ASSET_EXTENSIONS: &[&str] = &[
    ".pdf", ".jpg", ".png", ".gif", ".css", ".js", ".woff", ".woff2", ".mp4", ".webm",
];

static ASSET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(pdf|jpg|png|gif|css|js|woff2?|mp4|webm)$")
        .expect("asset extension pattern is valid")
});

/// Why a URL was kept out of the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// Host differs from the crawl's base domain
    ExternalDomain,
    /// Already visited (or already queued)
    AlreadySeen,
    /// Points at a static asset
    StaticAsset,
    /// Carries a fragment marker
    Fragment,
    /// Not an http(s) URL
    UnsupportedScheme,
}

/// Lower-case a host and strip a leading `www.`
pub fn normalize_domain(host: &str) -> String {
    let host = host.trim().to_lowercase();
    match host.strip_prefix("www.") {
        Some(stripped) => stripped.to_string(),
        None => host,
    }
}

/// Canonical string key of a URL: scheme, normalized host, port and path,
/// without query, fragment or trailing slash.
pub fn canonicalize(url: &Url) -> String {
    let host = url.host_str().map(normalize_domain).unwrap_or_default();
    let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
    let path = url.path().trim_end_matches('/');
    format!("{}://{}{}{}", url.scheme(), host, port, path)
}

/// Parse `raw` and return its canonical key, or `None` when it is not a URL
pub fn canonicalize_str(raw: &str) -> Option<String> {
    Url::parse(raw.trim()).ok().map(|u| canonicalize(&u))
}

/// Strip the fragment and query so the URL can be navigated to directly
pub fn fetchable(url: &Url) -> Url {
    let mut clean = url.clone();
    clean.set_fragment(None);
    clean.set_query(None);
    clean
}

/// Same-site filter bound to the crawl's base URL
#[derive(Debug, Clone)]
pub struct UrlFilter {
    base_domain: String,
    /// Explicit port of the base URL; scheme defaults count as unset
    base_port: Option<u16>,
}

impl UrlFilter {
    /// Create a filter scoped to the domain of `base`
    pub fn new(base: &Url) -> Self {
        Self {
            base_domain: base.host_str().map(normalize_domain).unwrap_or_default(),
            base_port: base.port(),
        }
    }

    /// The normalized domain this filter accepts
    pub fn base_domain(&self) -> &str {
        &self.base_domain
    }

    /// Check a URL against the eligibility rules, reporting the first rule it breaks.
    ///
    /// `raw` is the URL as discovered, `seen` answers whether a canonical key is
    /// already visited or queued.
    pub fn check(&self, raw: &str, seen: impl Fn(&str) -> bool) -> Result<Url, Rejection> {
        let url = Url::parse(raw).map_err(|_| Rejection::UnsupportedScheme)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Rejection::UnsupportedScheme);
        }
        if !self.is_same_site(&url) {
            return Err(Rejection::ExternalDomain);
        }
        if seen(&canonicalize(&url)) {
            return Err(Rejection::AlreadySeen);
        }
        if self.is_asset(raw) {
            return Err(Rejection::StaticAsset);
        }
        if raw.contains('#') {
            return Err(Rejection::Fragment);
        }
        Ok(url)
    }

    /// Boolean form of [`UrlFilter::check`]
    pub fn is_eligible(&self, raw: &str, seen: impl Fn(&str) -> bool) -> bool {
        self.check(raw, seen).is_ok()
    }

    fn is_same_site(&self, url: &Url) -> bool {
        let domain = url.host_str().map(normalize_domain).unwrap_or_default();
        domain == self.base_domain && url.port() == self.base_port
    }

    fn is_asset(&self, raw: &str) -> bool {
        let without_query = raw.split(['?', '#']).next().unwrap_or(raw);
        ASSET_PATTERN.is_match(without_query)
    }
}
