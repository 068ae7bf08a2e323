use async_trait::async_trait;
use base64::Engine as _;
use scraper::{Html, Selector};
use std::time::Duration;

use super::{empty_serp_error, fetch_serp_html, well_formed_http};
use crate::core::error::ProviderError;
use crate::tools::search::Provider;
use crate::types::Candidate;

const TRACKING_PATH_PREFIX: &str = "/ck/";
/// Observed format: `u=a1<base64url(destination)>`.
const PAYLOAD_PREFIX: &str = "a1";

fn is_bing_host(host: &str) -> bool {
    matches!(host, "www.bing.com" | "bing.com")
}

/// Decode a base64url payload (with or without padding, either alphabet).
fn decode_payload(raw: &str) -> Option<String> {
    let payload = raw.strip_prefix(PAYLOAD_PREFIX).unwrap_or(raw);
    let normalized: String = payload
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(normalized)
        .ok()?;
    String::from_utf8(bytes).ok()
}

/// Unwrap a Bing result href.
///
/// Only `www.bing.com/ck/...` tracking links are decoded; any other absolute
/// link is returned unchanged. Relative links and broken payloads are `None`.
pub fn decode_href(href: &str) -> Option<String> {
    let href = href.trim();
    if !(href.starts_with("http://") || href.starts_with("https://")) {
        return None;
    }

    let url = url::Url::parse(href).ok()?;
    let is_tracking = url.host_str().is_some_and(is_bing_host)
        && url.path().starts_with(TRACKING_PATH_PREFIX);
    if !is_tracking {
        return Some(href.to_string());
    }

    let encoded = url
        .query_pairs()
        .find(|(k, v)| k == "u" && !v.trim().is_empty())
        .map(|(_, v)| v.to_string())?;
    well_formed_http(&decode_payload(&encoded)?)
}

pub fn search_url(query: &str) -> reqwest::Url {
    let mut url = reqwest::Url::parse("https://www.bing.com/search").expect("static url");
    url.query_pairs_mut().append_pair("q", query);
    url
}

/// Result links are the `h2` anchors of `li.b_algo` items.
pub fn parse_links(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("li.b_algo h2 a[href]").unwrap();

    doc.select(&sel)
        .filter_map(|a| decode_href(a.value().attr("href").unwrap_or("")))
        .collect()
}

/// Direct HTTP retrieval of the Bing results page.
pub struct BingSearch {
    client: reqwest::Client,
    accept_language: String,
    timeout: Duration,
}

impl BingSearch {
    pub fn new(client: reqwest::Client, accept_language: String, timeout: Duration) -> Self {
        Self {
            client,
            accept_language,
            timeout,
        }
    }
}

#[async_trait]
impl Provider for BingSearch {
    fn name(&self) -> &'static str {
        "bing"
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

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(dest: &str, with_prefix: bool) -> String {
        let b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(dest.as_bytes());
        let u = if with_prefix { format!("a1{}", b64) } else { b64 };
        format!("https://www.bing.com/ck/a?!&&p=abc123&ptn=3&ver=2&u={}&ntb=1", u)
    }

    #[test]
    fn tracking_links_round_trip_byte_for_byte() {
        let samples = [
            "https://www.tab4u.com/tabs/songs/1234_Adele_-_Hello.html",
            "https://e-chords.com/chords/adele/hello?key=Fm&capo=4",
            "http://example.org/path/with%20space/",
            "https://www.cifraclub.com.br/adele/hello/#tabs=false",
            "https://nagnu.co.il/אקורדים/עומר-אדם",
            "https://chordu.com/a?b=1&c=~x_y-z",
        ];
        for dest in samples {
            assert_eq!(decode_href(&encode(dest, true)).as_deref(), Some(dest), "{dest}");
            assert_eq!(decode_href(&encode(dest, false)).as_deref(), Some(dest), "{dest}");
        }
    }

    #[test]
    fn padded_standard_alphabet_payload_decodes() {
        let dest = "https://azchords.com/a/adele-tabs-1/hello-tabs-2.html?";
        let b64 = base64::engine::general_purpose::STANDARD.encode(dest.as_bytes());
        let href = format!("https://www.bing.com/ck/a?u=a1{}", urlencode(&b64));
        assert_eq!(decode_href(&href).as_deref(), Some(dest));
    }

    fn urlencode(s: &str) -> String {
        percent_encoding::utf8_percent_encode(s, percent_encoding::NON_ALPHANUMERIC).to_string()
    }

    #[test]
    fn non_tracking_links_pass_through() {
        assert_eq!(
            decode_href("https://tab4u.com/x").as_deref(),
            Some("https://tab4u.com/x")
        );
        // right path, wrong host
        assert_eq!(
            decode_href("https://evil.example/ck/a?u=a1aHR0cHM6Ly94LmNvbQ").as_deref(),
            Some("https://evil.example/ck/a?u=a1aHR0cHM6Ly94LmNvbQ")
        );
    }

    #[test]
    fn malformed_payloads_are_none() {
        assert!(decode_href("https://www.bing.com/ck/a?u=a1!!!not-base64!!!").is_none());
        assert!(decode_href("https://www.bing.com/ck/a?p=1").is_none());
        // decodes, but not to an http(s) URL
        let ftp = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode("ftp://x.example/");
        assert!(decode_href(&format!("https://www.bing.com/ck/a?u=a1{}", ftp)).is_none());
        assert!(decode_href("/search?q=x").is_none());
    }

    #[test]
    fn parses_algo_headings() {
        let href = encode("https://www.tab4u.com/tabs/songs/1.html", true);
        let html = format!(
            r#"<ol id="b_results">
                <li class="b_algo"><h2><a href="{}">Hello chords</a></h2></li>
                <li class="b_ad"><h2><a href="https://ad.example/">Ad</a></h2></li>
                <li class="b_algo"><h2><a href="https://e-chords.com/x">Hello</a></h2></li>
            </ol>"#,
            href.replace('&', "&amp;")
        );
        assert_eq!(
            parse_links(&html),
            vec![
                "https://www.tab4u.com/tabs/songs/1.html".to_string(),
                "https://e-chords.com/x".to_string()
            ]
        );
    }
}
