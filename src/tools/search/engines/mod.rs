pub mod bing;
pub mod duckduckgo;
pub mod google;
pub mod mirror;
pub mod rendered;

use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

use crate::core::error::ProviderError;

/// The HTML search engines that have both a direct and a rendered adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Engine {
    Google,
    Bing,
    DuckDuckGo,
}

impl Engine {
    pub fn name(&self) -> &'static str {
        match self {
            Engine::Google => "google",
            Engine::Bing => "bing",
            Engine::DuckDuckGo => "duckduckgo",
        }
    }

    pub fn search_url(&self, query: &str) -> reqwest::Url {
        match self {
            Engine::Google => google::search_url(query),
            Engine::Bing => bing::search_url(query),
            Engine::DuckDuckGo => duckduckgo::search_url(query),
        }
    }

    /// Organic result links in page order, already decoded.
    pub fn parse_links(&self, html: &str) -> Vec<String> {
        match self {
            Engine::Google => google::parse_links(html),
            Engine::Bing => bing::parse_links(html),
            Engine::DuckDuckGo => duckduckgo::parse_links(html),
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Keep a decoded value only if it is a well-formed absolute http(s) URL.
pub(crate) fn well_formed_http(candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    let parsed = url::Url::parse(candidate).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }
    Some(candidate.to_string())
}

pub fn detect_block_reason(status: StatusCode, body: &str) -> Option<String> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Some("http_429".to_string());
    }
    if status == StatusCode::FORBIDDEN {
        return Some("http_403".to_string());
    }
    if status == StatusCode::SERVICE_UNAVAILABLE {
        return Some("http_503".to_string());
    }

    let lower = body.to_lowercase();
    let maybe = [
        ("our systems have detected unusual traffic", "unusual_traffic"),
        ("unusual traffic", "unusual_traffic"),
        (
            "sorry, but your computer or network may be sending automated queries",
            "captcha",
        ),
        ("recaptcha", "captcha"),
        ("hcaptcha", "captcha"),
        ("captcha", "captcha"),
        ("verify you are human", "captcha"),
        ("enable javascript", "js_required"),
        ("access denied", "access_denied"),
    ];

    for (needle, label) in maybe {
        if lower.contains(needle) {
            return Some(label.to_string());
        }
    }

    None
}

/// GET a search results page with browser-like headers.
///
/// Non-2xx is a failure; the body is returned for the engine to parse.
pub async fn fetch_serp_html(
    client: &reqwest::Client,
    url: reqwest::Url,
    accept_language: &str,
    timeout: Duration,
    engine: &str,
) -> Result<String, ProviderError> {
    let req = crate::antibot::browser_like(client.get(url), accept_language).timeout(timeout);

    let resp = req.send().await.map_err(|e| {
        if e.is_timeout() {
            ProviderError::Timeout(timeout)
        } else {
            ProviderError::Http(e.to_string())
        }
    })?;

    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| ProviderError::Http(e.to_string()))?;
    debug!("{} SERP: HTTP {} ({} bytes)", engine, status.as_u16(), body.len());

    if !status.is_success() {
        if let Some(reason) = detect_block_reason(status, &body) {
            return Err(ProviderError::Blocked(reason));
        }
        return Err(ProviderError::Status(status.as_u16()));
    }
    Ok(body)
}

/// Turn a parsed-but-empty SERP into the most informative error.
pub(crate) fn empty_serp_error(body: &str) -> ProviderError {
    match detect_block_reason(StatusCode::OK, body) {
        Some(reason) => ProviderError::Blocked(reason),
        None => ProviderError::NoLinks,
    }
}
