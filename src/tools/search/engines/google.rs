use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;

use super::{empty_serp_error, fetch_serp_html, well_formed_http};
use crate::core::error::ProviderError;
use crate::tools::search::Provider;
use crate::types::Candidate;

/// Unwrap a Google result href.
///
/// Absolute links pass through; `/url?q=<dest>` wrappers yield `<dest>`.
/// Anything else is not decodable.
pub fn decode_href(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    if href.starts_with("http://") || href.starts_with("https://") {
        return well_formed_http(href);
    }

    if href.starts_with("/url?") {
        let url = url::Url::parse(&format!("https://www.google.com{}", href)).ok()?;
        let dest = url
            .query_pairs()
            .find(|(k, v)| (k == "q" || k == "url") && !v.is_empty())
            .map(|(_, v)| v.to_string())?;
        return well_formed_http(&dest);
    }

    None
}

pub fn search_url(query: &str) -> reqwest::Url {
    let mut url = reqwest::Url::parse("https://www.google.com/search").expect("static url");
    url.query_pairs_mut()
        .append_pair("hl", "en")
        .append_pair("gl", "us")
        .append_pair("num", "10")
        .append_pair("q", query);
    url
}

/// Result links are anchors inside `#search` that wrap an `<h3>` title.
pub fn parse_links(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let link_sel = Selector::parse("#search a[href]").unwrap();
    let h3_sel = Selector::parse("h3").unwrap();

    doc.select(&link_sel)
        .filter(|a| a.select(&h3_sel).next().is_some())
        .filter_map(|a| decode_href(a.value().attr("href").unwrap_or("")))
        .collect()
}

/// Direct HTTP retrieval of the Google results page.
pub struct GoogleSearch {
    client: reqwest::Client,
    accept_language: String,
    timeout: Duration,
}

impl GoogleSearch {
    pub fn new(client: reqwest::Client, accept_language: String, timeout: Duration) -> Self {
        Self {
            client,
            accept_language,
            timeout,
        }
    }
}

#[async_trait]
impl Provider for GoogleSearch {
    fn name(&self) -> &'static str {
        "google"
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
