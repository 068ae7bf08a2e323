//! Native browser management using `chromiumoxide`.
//!
//! * Finding a usable browser executable (Chrome → Chromium → Brave, cross-platform).
//! * `BrowserPool`: one explicitly owned headless browser, launched lazily,
//!   restarted after a crash, with a fresh isolated browser context per request.
//!
//! Contexts are per request: cookies and storage never leak between
//! two captures even though they share the same browser process.

use anyhow::{anyhow, Result};
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams,
};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, Page};
use futures::future::BoxFuture;
use futures::StreamExt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::antibot::random_user_agent;
use crate::core::config::chrome_executable_override;
use crate::core::error::{EnvironmentError, FetchError};

// ── Browser executable discovery ─────────────────────────────────────────────

/// Find a usable Chromium-family browser executable.
///
/// Resolution order:
/// 1. `CHROME_EXECUTABLE` env var (explicit override)
/// 2. PATH scan
/// 3. OS-specific well-known install paths.
pub fn find_chrome_executable() -> Option<String> {
    if let Some(p) = chrome_executable_override() {
        return Some(p);
    }

    if let Ok(path_var) = std::env::var("PATH") {
        let candidates = [
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
            "chrome",
            "brave-browser",
        ];
        for dir in std::env::split_paths(&path_var) {
            for exe in candidates {
                let full = dir.join(exe);
                if full.exists() {
                    return Some(full.to_string_lossy().to_string());
                }
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        let candidates = [
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        let candidates = [
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/local/bin/chromium",
            "/snap/bin/chromium",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        let candidates = [
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    None
}

// ── Headless browser config builder ──────────────────────────────────────────

/// Build a `BrowserConfig` for headless operation.
///
/// `--disable-blink-features=AutomationControlled` hides `navigator.webdriver`,
/// which is enough to get ordinary SERP markup from the engines.
pub fn build_headless_config(exe: &str, width: u32, height: u32) -> Result<BrowserConfig> {
    BrowserConfig::builder()
        .chrome_executable(exe)
        .viewport(Viewport {
            width,
            height,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .window_size(width, height)
        .arg("--disable-gpu")
        .arg("--no-sandbox") // often required in containers
        .arg("--disable-setuid-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-extensions")
        .arg("--disable-background-networking")
        .arg("--disable-sync")
        .arg("--disable-translate")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--hide-scrollbars")
        .arg("--mute-audio")
        .arg("--disable-blink-features=AutomationControlled")
        .arg(format!("--user-agent={}", random_user_agent()))
        .build()
        .map_err(|e| anyhow!("Failed to build browser config: {}", e))
}

// ── Scoped teardown ──────────────────────────────────────────────────────────

/// Time allowed for closing a page and disposing its context after a capture.
pub const TEARDOWN_GRACE: Duration = Duration::from_secs(3);

/// A cleanup future that runs exactly once.
///
/// [`ScopedTeardown::run`] awaits it inline. If the owner is dropped first
/// (cancelled request, outer timeout), `Drop` spawns it on the current runtime.
pub struct ScopedTeardown {
    task: Option<BoxFuture<'static, ()>>,
}

impl ScopedTeardown {
    pub fn new(task: impl Future<Output = ()> + Send + 'static) -> Self {
        Self {
            task: Some(Box::pin(task)),
        }
    }

    /// Drop the cleanup without running it.
    pub fn disarm(mut self) {
        self.task = None;
    }

    /// Run the cleanup now, bounded by [`TEARDOWN_GRACE`].
    pub async fn run(mut self) {
        if let Some(task) = self.task.take() {
            if tokio::time::timeout(TEARDOWN_GRACE, task).await.is_err() {
                warn!("browser teardown exceeded {:?}", TEARDOWN_GRACE);
            }
        }
    }
}

impl Drop for ScopedTeardown {
    fn drop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("capture dropped before teardown; cleaning up in background");
                handle.spawn(task);
            }
            Err(_) => warn!("capture dropped outside a runtime; browser context not disposed"),
        }
    }
}

type SharedBrowser = Arc<Mutex<Option<Browser>>>;

async fn dispose_context(browser: SharedBrowser, context: BrowserContextId) {
    let mut guard = browser.lock().await;
    if let Some(browser) = guard.as_mut() {
        if let Err(e) = browser.dispose_browser_context(context).await {
            debug!("context dispose error (non-fatal): {}", e);
        }
    }
}

async fn close_page_and_context(page: Page, browser: SharedBrowser, context: BrowserContextId) {
    if let Err(e) = page.close().await {
        debug!("page close error (non-fatal): {}", e);
    }
    dispose_context(browser, context).await;
}

// ── Browser Pool ─────────────────────────────────────────────────────────────

/// A long-lived headless browser shared by all requests.
///
/// The browser is started on first use. If it has crashed, the next capture
/// restarts it. Every capture runs in its own browser context, which is
/// disposed when the capture ends, successfully or not, including when the
/// capture future is dropped half-way.
///
/// Owned by `AppState` and closed explicitly with [`BrowserPool::shutdown`].
pub struct BrowserPool {
    exe: Option<String>,
    inner: SharedBrowser,
}

/// What to do with a page between navigation and HTML capture.
#[derive(Clone, Debug, Default)]
pub struct CaptureOptions {
    /// Wait after navigation for client-side rendering.
    pub settle: Duration,
    /// Best-effort script run after settling; failures are ignored.
    /// Returning `true` from the script triggers a second settle wait.
    pub prelude_js: Option<&'static str>,
}

/// An open page in its own browser context, torn down when finished or dropped.
struct IsolatedPage {
    page: Page,
    teardown: ScopedTeardown,
}

impl BrowserPool {
    /// Create a pool for the given executable (or none). Browser is lazy-started.
    pub fn new(exe: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            exe,
            inner: Arc::new(Mutex::new(None)),
        })
    }

    /// Create a pool using the auto-discovered executable.
    ///
    /// Construction succeeds without a browser; captures then fail with an
    /// [`EnvironmentError`].
    pub fn discover() -> Arc<Self> {
        let exe = find_chrome_executable();
        match &exe {
            Some(p) => info!("browser pool: using {}", p),
            None => warn!("browser pool: no Chromium-family browser found"),
        }
        Self::new(exe)
    }

    pub fn executable(&self) -> Option<&str> {
        self.exe.as_deref()
    }

    async fn launch(exe: &str) -> Result<Browser, FetchError> {
        info!("🚀 Browser pool: launching new instance ({})", exe);
        let config = build_headless_config(exe, 1366, 900)
            .map_err(|e| FetchError::Browser(e.to_string()))?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::Browser(format!("failed to launch ({}): {}", exe, e)))?;
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Pool CDP handler error: {}", e);
                }
            }
        });
        Ok(browser)
    }

    /// Open a blank page inside a brand new browser context.
    ///
    /// The context is covered by a [`ScopedTeardown`] from the moment it
    /// exists, so every early return or cancellation disposes it.
    async fn open_isolated_page(&self) -> Result<IsolatedPage, FetchError> {
        let exe = self
            .exe
            .as_deref()
            .ok_or_else(EnvironmentError::browser_missing)?;

        let mut guard = self.inner.lock().await;

        // One restart attempt if the running instance is dead.
        for attempt in 0..2 {
            if guard.is_none() {
                *guard = Some(Self::launch(exe).await?);
            }
            let Some(browser) = guard.as_mut() else {
                continue;
            };

            let created = browser
                .create_browser_context(CreateBrowserContextParams::default())
                .await;
            let context = match created {
                Ok(id) => id,
                Err(e) => {
                    warn!("🔄 Browser pool: context creation failed ({}), restarting", e);
                    if let Some(mut old) = guard.take() {
                        let _ = old.close().await;
                    }
                    if attempt == 1 {
                        return Err(FetchError::Browser(e.to_string()));
                    }
                    continue;
                }
            };
            let context_only =
                ScopedTeardown::new(dispose_context(self.inner.clone(), context.clone()));

            let mut params = CreateTargetParams::new("about:blank");
            params.browser_context_id = Some(context.clone());

            let page = browser
                .new_page(params)
                .await
                .map_err(|e| FetchError::Browser(format!("failed to open tab: {}", e)))?;

            // The page now exists too; swap in the fuller cleanup.
            context_only.disarm();
            let teardown = ScopedTeardown::new(close_page_and_context(
                page.clone(),
                self.inner.clone(),
                context,
            ));
            return Ok(IsolatedPage { page, teardown });
        }

        Err(FetchError::Browser("browser unavailable".to_string()))
    }

    /// Navigate to `url` in an isolated context and return the rendered HTML.
    ///
    /// Opening the context and the capture share one `timeout`; teardown then
    /// gets up to [`TEARDOWN_GRACE`]. Callers bounding this call themselves
    /// should allow `timeout + TEARDOWN_GRACE`.
    pub async fn capture_html(
        &self,
        url: &str,
        opts: &CaptureOptions,
        timeout: Duration,
    ) -> Result<String, FetchError> {
        let deadline = tokio::time::Instant::now() + timeout;

        let isolated = match tokio::time::timeout_at(deadline, self.open_isolated_page()).await {
            Ok(r) => r?,
            Err(_) => return Err(FetchError::Timeout(timeout)),
        };
        let page = &isolated.page;

        let capture = async {
            page.goto(url)
                .await
                .map_err(|e| FetchError::Browser(format!("navigation failed: {}", e)))?;
            if !opts.settle.is_zero() {
                tokio::time::sleep(opts.settle).await;
            }
            if let Some(js) = opts.prelude_js {
                // A truthy result means the page changed; give it another settle period.
                match page.evaluate(js).await {
                    Ok(v) => {
                        if v.into_value::<bool>().unwrap_or(false) && !opts.settle.is_zero() {
                            tokio::time::sleep(opts.settle).await;
                        }
                    }
                    Err(e) => debug!("prelude script failed (ignored): {}", e),
                }
            }
            page.content()
                .await
                .map_err(|e| FetchError::Browser(format!("failed to read content: {}", e)))
        };

        let result = match tokio::time::timeout_at(deadline, capture).await {
            Ok(r) => r,
            Err(_) => Err(FetchError::Timeout(timeout)),
        };

        isolated.teardown.run().await;

        if let Ok(html) = &result {
            debug!("captured {} chars from {}", html.len(), url);
        }
        result
    }

    /// Gracefully close the pooled browser instance.
    pub async fn shutdown(&self) {
        let mut guard = self.inner.lock().await;
        if let Some(mut b) = guard.take() {
            let _ = b.close().await;
            info!("🛑 Browser pool shut down");
        }
    }
}

impl Drop for BrowserPool {
    fn drop(&mut self) {
        // Drop cannot await; spawn the close on the current runtime, if any.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        if let Ok(mut guard) = self.inner.try_lock() {
            if let Some(mut browser) = guard.take() {
                handle.spawn(async move {
                    let _ = browser.close().await;
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_teardown(counter: &Arc<AtomicUsize>) -> ScopedTeardown {
        let counter = counter.clone();
        ScopedTeardown::new(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn capture_without_browser_is_environment_error() {
        let pool = BrowserPool::new(None);
        let err = pool
            .capture_html("https://example.com", &CaptureOptions::default(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Environment(_)));
        assert!(err.to_string().contains("CHROME_EXECUTABLE"));
    }

    #[test]
    fn shutdown_without_launch_is_noop() {
        let pool = BrowserPool::new(Some("/nonexistent/chrome".into()));
        tokio_test::block_on(pool.shutdown());
        assert_eq!(pool.executable(), Some("/nonexistent/chrome"));
    }

    #[tokio::test]
    async fn cancelled_capture_still_tears_down() {
        let counter = Arc::new(AtomicUsize::new(0));
        let teardown = counting_teardown(&counter);

        // Stands in for a capture stuck in navigation when the outer deadline fires.
        let hung_capture = async move {
            let _teardown = teardown;
            futures::future::pending::<()>().await;
        };
        let outcome = tokio::time::timeout(Duration::from_millis(20), hung_capture).await;
        assert!(outcome.is_err());

        for _ in 0..50 {
            if counter.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn awaited_teardown_runs_exactly_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        counting_teardown(&counter).run().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disarmed_teardown_never_runs() {
        let counter = Arc::new(AtomicUsize::new(0));
        counting_teardown(&counter).disarm();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
