use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;

use super::{empty_serp_error, fetch_serp_html, well_formed_http};
use crate::core::error::ProviderError;
use crate::tools::search::Provider;
use crate::types::Candidate;

fn uddg_target(url: &url::Url) -> Option<String> {
    let dest = url
        .query_pairs()
        .find(|(k, v)| k == "uddg" && !v.is_empty())
        .map(|(_, v)| v.to_string())?;
    well_formed_http(&dest)
}

/// Unwrap a DuckDuckGo result href.
///
/// Redirect links (`/l/?uddg=<dest>`, absolute or protocol-relative) yield
/// `<dest>`. Non-DuckDuckGo absolute links pass through.
pub fn decode_href(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else if href.starts_with("/l/?") {
        format!("https://duckduckgo.com{}", href)
    } else if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        return None;
    };

    let url = url::Url::parse(&absolute).ok()?;
    let on_ddg = url
        .host_str()
        .is_some_and(|h| h == "duckduckgo.com" || h.ends_with(".duckduckgo.com"));
    if on_ddg {
        uddg_target(&url)
    } else {
        well_formed_http(&absolute)
    }
}

pub fn search_url(query: &str) -> reqwest::Url {
    let mut url = reqwest::Url::parse("https://duckduckgo.com/html/").expect("static url");
    url.query_pairs_mut().append_pair("q", query);
    url
}

/// Result links are `.result__a` anchors (HTML endpoint) or the
/// `result-title-a` test ids (JS endpoint).
pub fn parse_links(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse(".result__a, a[data-testid='result-title-a']").unwrap();

    doc.select(&sel)
        .filter_map(|a| decode_href(a.value().attr("href").unwrap_or("")))
        .collect()
}

/// Direct HTTP retrieval of the DuckDuckGo HTML results page.
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    accept_language: String,
    timeout: Duration,
}

impl DuckDuckGoSearch {
    pub fn new(client: reqwest::Client, accept_language: String, timeout: Duration) -> Self {
        Self {
            client,
            accept_language,
            timeout,
        }
    }
}

#[async_trait]
impl Provider for DuckDuckGoSearch {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch_candidates(&self, query: &str) -> Result<Vec<Candidate>, ProviderError> {
        let body = fetch_serp_html(
            &self.client,
            search_url(query),
            &self.accept_language,
            self.timeout,
            self.name(),
        )
        .await?;

        let links = parse_links(&body);
        if links.is_empty() {
            return Err(empty_serp_error(&body));
        }
        Ok(links
            .into_iter()
            .enumerate()
            .map(|(i, url)| Candidate::new(url, self.name(), i))
            .collect())
    }
}
