//! Browser-like request identity for search and target-page requests.
//!
//! Search engines serve stripped or blocked pages to obvious bots, so every
//! outbound GET carries a desktop User-Agent and the headers a real browser
//! sends on a top-level navigation.

use rand::seq::IndexedRandom;

/// Realistic desktop user agents. Mobile agents get different SERP markup, so none here.
pub const DESKTOP_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.7; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36 Edg/132.0.0.0",
];

/// Returns a randomly-chosen desktop User-Agent string.
pub fn random_user_agent() -> &'static str {
    DESKTOP_USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(DESKTOP_USER_AGENTS[0])
}

/// Headers sent alongside the User-Agent on every navigation-style request.
pub fn navigation_headers(accept_language: &str) -> Vec<(&'static str, String)> {
    vec![
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        ),
        ("Accept-Language", accept_language.to_string()),
        ("Upgrade-Insecure-Requests", "1".to_string()),
        ("Sec-Fetch-Dest", "document".to_string()),
        ("Sec-Fetch-Mode", "navigate".to_string()),
        ("Sec-Fetch-Site", "none".to_string()),
    ]
}

/// Apply the User-Agent and navigation headers to a request.
pub fn browser_like(req: reqwest::RequestBuilder, accept_language: &str) -> reqwest::RequestBuilder {
    let mut req = req.header("User-Agent", random_user_agent());
    for (k, v) in navigation_headers(accept_language) {
        req = req.header(k, v);
    }
    req
}
