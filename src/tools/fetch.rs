//! Content Fetcher: retrieve the page behind a resolved URL.
//!
//! HTTP mode tries a direct GET first and falls back to the text mirror.
//! Browser mode renders the page in an isolated browser context instead.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::config::{FetchMode, ScoutConfig};
use crate::core::error::FetchError;
use crate::scraping::browser_manager::{BrowserPool, CaptureOptions};
use crate::scraping::sanitize::mirror_snapshot_html;
use crate::tools::search::engines::mirror::mirror_url;

/// Which strategy produced a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchSource {
    Direct,
    Mirror,
    Rendered,
}

impl FetchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchSource::Direct => "direct",
            FetchSource::Mirror => "mirror",
            FetchSource::Rendered => "rendered",
        }
    }
}

#[derive(Clone, Debug)]
pub struct FetchedDocument {
    /// The candidate URL the document belongs to (before redirects).
    pub url: String,
    pub html: String,
    pub source: FetchSource,
}

fn is_html_content_type(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.contains("text/html") || ct.contains("application/xhtml+xml")
}

fn map_send_error(e: reqwest::Error, timeout: Duration) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(timeout)
    } else {
        FetchError::Http(e.to_string())
    }
}

pub struct ContentFetcher {
    mode: FetchMode,
    client: reqwest::Client,
    accept_language: String,
    mirror_base: Option<String>,
    page_timeout: Duration,
    mirror_timeout: Duration,
    render_timeout: Duration,
    render_settle: Duration,
    pool: Option<Arc<BrowserPool>>,
    max_candidates: usize,
}

impl ContentFetcher {
    pub fn new(
        config: &ScoutConfig,
        client: reqwest::Client,
        pool: Option<Arc<BrowserPool>>,
    ) -> Self {
        Self {
            mode: config.resolve_mode(),
            client,
            accept_language: config.resolve_accept_language(),
            mirror_base: config.resolve_mirror_base_url(),
            page_timeout: config.resolve_page_timeout(),
            mirror_timeout: config.resolve_mirror_page_timeout(),
            render_timeout: config.resolve_render_timeout(),
            render_settle: config.resolve_render_settle(),
            pool,
            max_candidates: config.resolve_max_embed_candidates(),
        }
    }

    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    /// Direct GET. Accepts 2xx/3xx with an HTML-like content type.
    pub async fn fetch_direct(&self, url: &str) -> Result<String, FetchError> {
        let req = crate::antibot::browser_like(self.client.get(url), &self.accept_language)
            .timeout(self.page_timeout);
        let resp = req
            .send()
            .await
            .map_err(|e| map_send_error(e, self.page_timeout))?;

        let status = resp.status().as_u16();
        if !(200..400).contains(&status) {
            return Err(FetchError::Status(status));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        if !is_html_content_type(&content_type) {
            let shown = if content_type.is_empty() {
                "unknown".to_string()
            } else {
                content_type
            };
            return Err(FetchError::UnsupportedContentType(shown));
        }

        resp.text()
            .await
            .map_err(|e| map_send_error(e, self.page_timeout))
    }

    /// Text snapshot of `url` via the mirror, wrapped as a small HTML page.
    pub async fn fetch_via_mirror(&self, url: &str) -> Result<String, FetchError> {
        let base = self.mirror_base.as_deref().ok_or(FetchError::MirrorDisabled)?;
        let target = mirror_url(base, url);
        let req = crate::antibot::browser_like(self.client.get(&target), &self.accept_language)
            .timeout(self.mirror_timeout);
        let resp = req
            .send()
            .await
            .map_err(|e| map_send_error(e, self.mirror_timeout))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::MirrorStatus(status.as_u16()));
        }
        let text = resp
            .text()
            .await
            .map_err(|e| map_send_error(e, self.mirror_timeout))?;
        Ok(mirror_snapshot_html(&text, url))
    }

    /// Fully rendered HTML from the shared browser.
    pub async fn fetch_rendered(&self, url: &str) -> Result<String, FetchError> {
        let pool = match &self.pool {
            Some(p) => p,
            None => return Err(crate::core::error::EnvironmentError::browser_missing().into()),
        };
        let opts = CaptureOptions {
            settle: self.render_settle,
            prelude_js: None,
        };
        pool.capture_html(url, &opts, self.render_timeout).await
    }

    /// One URL, every strategy the mode allows.
    pub async fn fetch_document(&self, url: &str) -> Result<FetchedDocument, FetchError> {
        if self.mode == FetchMode::Browser {
            let html = self.fetch_rendered(url).await?;
            return Ok(FetchedDocument {
                url: url.to_string(),
                html,
                source: FetchSource::Rendered,
            });
        }

        let direct_err = match self.fetch_direct(url).await {
            Ok(html) => {
                return Ok(FetchedDocument {
                    url: url.to_string(),
                    html,
                    source: FetchSource::Direct,
                })
            }
            Err(e) => e,
        };
        debug!("direct fetch of {} failed: {}", url, direct_err);

        if self.mirror_base.is_none() {
            return Err(direct_err);
        }

        let html = self.fetch_via_mirror(url).await?;
        info!("fetched {} via text mirror", url);
        Ok(FetchedDocument {
            url: url.to_string(),
            html,
            source: FetchSource::Mirror,
        })
    }

    /// First candidate that can be fetched.
    ///
    /// HTTP mode walks up to `max_candidates` URLs; browser mode renders only
    /// the first. The error of the last attempt is returned when all fail.
    pub async fn fetch_first_available(
        &self,
        candidates: &[String],
    ) -> Result<FetchedDocument, FetchError> {
        let limit = match self.mode {
            FetchMode::Browser => 1,
            FetchMode::Http => self.max_candidates,
        };

        let mut last_err = FetchError::NoCandidates;
        for url in candidates.iter().take(limit) {
            match self.fetch_document(url).await {
                Ok(doc) => return Ok(doc),
                Err(e) => {
                    warn!("could not fetch candidate {}: {}", url, e);
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}
