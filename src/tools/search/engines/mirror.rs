//! Text-mirror search fallback.
//!
//! The mirror service returns a markdown rendering of any page it is pointed
//! at, so a Google results page comes back as a list of `[title](url)` links.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

use super::well_formed_http;
use crate::core::error::ProviderError;
use crate::tools::search::ranking::is_search_engine_url;
use crate::tools::search::Provider;
use crate::types::Candidate;

pub const MAX_MIRROR_LINKS: usize = 8;

/// Characters left unescaped by a URI-component encoder.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

static HEADING_LINK: OnceLock<Regex> = OnceLock::new();
static ANY_LINK: OnceLock<Regex> = OnceLock::new();

fn heading_link() -> &'static Regex {
    HEADING_LINK.get_or_init(|| Regex::new(r"\]\((https?://[^)\s]+)\)$").expect("valid regex"))
}

fn any_link() -> &'static Regex {
    ANY_LINK.get_or_init(|| Regex::new(r"\[[^\]]+\]\((https?://[^)\s]+)\)").expect("valid regex"))
}

/// Mirror address for an arbitrary page: `{base}/http://<host/path>`.
pub fn mirror_url(base: &str, target: &str) -> String {
    let stripped = target
        .strip_prefix("https://")
        .or_else(|| target.strip_prefix("http://"))
        .unwrap_or(target);
    format!("{}/http://{}", base.trim_end_matches('/'), stripped)
}

/// Mirror address of a Google results page for `query`.
pub fn search_mirror_url(base: &str, query: &str) -> String {
    format!(
        "{}/http://www.google.com/search?q={}",
        base.trim_end_matches('/'),
        utf8_percent_encode(query, COMPONENT)
    )
}

/// Pull result links out of mirrored markdown.
///
/// Heading lines (`[### title](url)`) are taken first, then any other inline
/// link. Search-engine links are skipped and duplicates dropped.
pub fn extract_links(markdown: &str, limit: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();

    let mut push = |candidate: &str, out: &mut Vec<String>| -> bool {
        if let Some(url) = well_formed_http(candidate) {
            if !is_search_engine_url(&url) && seen.insert(url.clone()) {
                out.push(url);
            }
        }
        out.len() >= limit
    };

    for line in markdown.lines() {
        if !line.starts_with("[### ") {
            continue;
        }
        if let Some(caps) = heading_link().captures(line.trim_end()) {
            if push(&caps[1], &mut out) {
                return out;
            }
        }
    }

    for caps in any_link().captures_iter(markdown) {
        if push(&caps[1], &mut out) {
            return out;
        }
    }

    out
}

pub struct MirrorSearch {
    client: reqwest::Client,
    base_url: String,
    accept_language: String,
    timeout: Duration,
}

impl MirrorSearch {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        accept_language: String,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            accept_language,
            timeout,
        }
    }
}

#[async_trait]
impl Provider for MirrorSearch {
    fn name(&self) -> &'static str {
        "mirror"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch_candidates(&self, query: &str) -> Result<Vec<Candidate>, ProviderError> {
        let url = search_mirror_url(&self.base_url, query);
        let req = crate::antibot::browser_like(self.client.get(&url), &self.accept_language)
            .timeout(self.timeout);

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(self.timeout)
            } else {
                ProviderError::Http(e.to_string())
            }
        })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        debug!("mirror SERP: {} bytes", body.len());

        let links = extract_links(&body, MAX_MIRROR_LINKS);
        if links.is_empty() {
            return Err(ProviderError::NoLinks);
        }
        Ok(links
            .into_iter()
            .enumerate()
            .map(|(i, url)| Candidate::new(url, self.name(), i))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Title: Adele Hello chords - Google Search\n\
URL Source: http://www.google.com/search?q=Adele+Hello+chords\n\
\n\
[Images](https://www.google.com/search?tbm=isch&q=adele)\n\
[### HELLO CHORDS by Adele @ Ultimate-Guitar.Com tabs.ultimate-guitar.com › adele › hello-chords](https://tabs.ultimate-guitar.com/tab/adele/hello-chords-1780199)\n\
Some snippet text with [an inline link](https://e-chords.com/chords/adele/hello).\n\
[### Hello - Adele - Cifra Club](https://www.cifraclub.com/adele/hello/)\n\
[### Duplicate](https://www.cifraclub.com/adele/hello/)\n";

    #[test]
    fn heading_links_come_first() {
        let links = extract_links(SAMPLE, MAX_MIRROR_LINKS);
        assert_eq!(
            links,
            vec![
                "https://tabs.ultimate-guitar.com/tab/adele/hello-chords-1780199".to_string(),
                "https://www.cifraclub.com/adele/hello/".to_string(),
                "https://e-chords.com/chords/adele/hello".to_string(),
            ]
        );
    }

    #[test]
    fn search_engine_links_are_skipped() {
        let links = extract_links(SAMPLE, MAX_MIRROR_LINKS);
        assert!(links.iter().all(|u| !u.contains("google.com")));
    }

    #[test]
    fn limit_is_respected() {
        let md: String = (0..20)
            .map(|i| format!("[### r{i}](https://site{i}.example/chords)\n"))
            .collect();
        assert_eq!(extract_links(&md, MAX_MIRROR_LINKS).len(), MAX_MIRROR_LINKS);
        assert_eq!(extract_links(&md, 2).len(), 2);
    }

    #[test]
    fn empty_markdown_yields_nothing() {
        assert!(extract_links("", MAX_MIRROR_LINKS).is_empty());
        assert!(extract_links("no links here", MAX_MIRROR_LINKS).is_empty());
    }

    #[test]
    fn mirror_urls() {
        assert_eq!(
            mirror_url("https://r.jina.ai/", "https://www.tab4u.com/a?b=1"),
            "https://r.jina.ai/http://www.tab4u.com/a?b=1"
        );
        assert_eq!(
            search_mirror_url("https://r.jina.ai", "Adele Hello & more"),
            "https://r.jina.ai/http://www.google.com/search?q=Adele%20Hello%20%26%20more"
        );
    }
}
