//! Browser identity for outbound requests.

use anyhow::{Result, anyhow};
use rand::seq::IndexedRandom;
use rand::rng;
use reqwest::header::{
    ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CACHE_CONTROL, CONNECTION, DNT, HeaderMap,
    HeaderName, HeaderValue, PRAGMA, REFERER, UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};
use tracing::debug;

/// Used when the user-agent source cannot produce one.
pub const FALLBACK_USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:123.0) Gecko/20100101 Firefox/123.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.3 Safari/605.1.15",
];

pub const DOCUMENT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const BROWSER_CATALOG: &[&str] = &[
    // Chrome
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    // Firefox
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0",
    // Safari
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
    // Edge
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
];

/// Somewhere to draw a plausible user agent from.
pub trait UserAgentSource {
    fn user_agent(&self) -> Result<String>;
}

/// Current desktop browser user agents, picked uniformly.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserCatalog;

impl UserAgentSource for BrowserCatalog {
    fn user_agent(&self) -> Result<String> {
        BROWSER_CATALOG
            .choose(&mut rng())
            .map(|ua| ua.to_string())
            .ok_or_else(|| anyhow!("browser catalog is empty"))
    }
}

/// Always the same, caller-chosen user agent.
#[derive(Debug, Clone)]
pub struct FixedUserAgent(pub String);

impl UserAgentSource for FixedUserAgent {
    fn user_agent(&self) -> Result<String> {
        if self.0.trim().is_empty() {
            return Err(anyhow!("empty user agent"));
        }
        Ok(self.0.clone())
    }
}

pub fn fallback_user_agent() -> &'static str {
    FALLBACK_USER_AGENTS
        .choose(&mut rng())
        .copied()
        .unwrap_or(FALLBACK_USER_AGENTS[0])
}

pub fn random_user_agent(source: &dyn UserAgentSource) -> String {
    match source.user_agent() {
        Ok(ua) => ua,
        Err(e) => {
            debug!("user agent source failed ({e}), using fallback pool");
            fallback_user_agent().to_string()
        }
    }
}

/// Headers for a JSON request against the deals API.
pub fn api_headers(source: &dyn UserAgentSource) -> HeaderMap {
    let mut h = HeaderMap::new();
    if let Ok(ua) = HeaderValue::from_str(&random_user_agent(source)) {
        h.insert(USER_AGENT, ua);
    } else {
        h.insert(USER_AGENT, HeaderValue::from_static(FALLBACK_USER_AGENTS[0]));
    }
    h.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
    h.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    h.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate, br"));
    h.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    h.insert(REFERER, HeaderValue::from_static("https://www.newegg.com/"));
    h.insert(
        HeaderName::from_static("sec-ch-ua"),
        HeaderValue::from_static(r#""Chromium";v="122", "Not(A:Brand";v="24", "Google Chrome";v="122""#),
    );
    h.insert(HeaderName::from_static("sec-ch-ua-mobile"), HeaderValue::from_static("?0"));
    h.insert(HeaderName::from_static("sec-ch-ua-platform"), HeaderValue::from_static(r#""Windows""#));
    h.insert(HeaderName::from_static("sec-fetch-dest"), HeaderValue::from_static("empty"));
    h.insert(HeaderName::from_static("sec-fetch-mode"), HeaderValue::from_static("cors"));
    h.insert(HeaderName::from_static("sec-fetch-site"), HeaderValue::from_static("same-origin"));
    h.insert(DNT, HeaderValue::from_static("1"));
    h.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    h.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    h
}

/// Headers for a top-level navigation to an HTML page.
pub fn document_headers() -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(USER_AGENT, HeaderValue::from_static(DOCUMENT_USER_AGENT));
    h.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    h.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    h.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate, br"));
    h.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    h.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    h.insert(HeaderName::from_static("sec-fetch-dest"), HeaderValue::from_static("document"));
    h.insert(HeaderName::from_static("sec-fetch-mode"), HeaderValue::from_static("navigate"));
    h.insert(HeaderName::from_static("sec-fetch-site"), HeaderValue::from_static("none"));
    h.insert(HeaderName::from_static("sec-fetch-user"), HeaderValue::from_static("?1"));
    h
}
