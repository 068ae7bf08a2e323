//! Browser-rendered search: the same engines, driven through the shared
//! headless browser instead of a plain HTTP GET.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::{empty_serp_error, Engine};
use crate::core::error::ProviderError;
use crate::scraping::browser_manager::{BrowserPool, CaptureOptions, TEARDOWN_GRACE};
use crate::tools::search::Provider;
use crate::types::Candidate;

/// Clicks the first visible cookie/consent "accept" button, if any.
/// Returns `true` when something was clicked.
pub const DISMISS_CONSENT_JS: &str = r#"
(() => {
    const needles = ['accept all', 'i agree', 'agree', 'accept', 'got it', 'alle akzeptieren'];
    const buttons = Array.from(document.querySelectorAll(
        'button, [role="button"], input[type="button"], input[type="submit"]'
    ));
    for (const el of buttons) {
        const rect = el.getBoundingClientRect();
        if (rect.width === 0 || rect.height === 0) continue;
        const t = (el.innerText || el.value || el.getAttribute('aria-label') || '').trim().toLowerCase();
        if (!t || !needles.some(n => t === n || t.startsWith(n + ' '))) continue;
        try { el.click(); return true; } catch (_) {}
    }
    return false;
})()
"#;

/// Slack between the capture deadline and the provider deadline, so the
/// capture always times out (and cleans up) on its own first.
const PROVIDER_SLACK: Duration = Duration::from_secs(1);

pub struct RenderedSearch {
    engine: Engine,
    pool: Arc<BrowserPool>,
    settle: Duration,
    timeout: Duration,
}

impl RenderedSearch {
    pub fn new(engine: Engine, pool: Arc<BrowserPool>, settle: Duration, timeout: Duration) -> Self {
        Self {
            engine,
            pool,
            settle,
            timeout,
        }
    }
}

#[async_trait]
impl Provider for RenderedSearch {
    fn name(&self) -> &'static str {
        self.engine.name()
    }

    fn timeout(&self) -> Duration {
        self.timeout + TEARDOWN_GRACE + PROVIDER_SLACK
    }

    async fn fetch_candidates(&self, query: &str) -> Result<Vec<Candidate>, ProviderError> {
        let url = self.engine.search_url(query);
        let opts = CaptureOptions {
            settle: self.settle,
            prelude_js: Some(DISMISS_CONSENT_JS),
        };
        let html = self
            .pool
            .capture_html(url.as_str(), &opts, self.timeout)
            .await?;

        let links = self.engine.parse_links(&html);
        if links.is_empty() {
            return Err(empty_serp_error(&html));
        }
        Ok(links
            .into_iter()
            .enumerate()
            .map(|(i, url)| Candidate::new(url, self.name(), i))
            .collect())
    }
}
