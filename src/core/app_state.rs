use std::sync::Arc;

use crate::core::config::{FetchMode, ScoutConfig};
use crate::scraping::browser_manager::BrowserPool;
use crate::tools::fetch::ContentFetcher;
use crate::tools::search::Resolver;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
    pub fetcher: Arc<ContentFetcher>,
    // Shared headless browser; only present in browser mode.
    pub browser_pool: Option<Arc<BrowserPool>>,
    /// File-based config loaded from `chord-scout.json` (env-var fallback for all fields).
    pub config: Arc<ScoutConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("mode", &self.config.resolve_mode().as_str())
            .field("providers", &self.resolver.provider_names())
            .field("browser_pool_enabled", &self.browser_pool.is_some())
            .finish()
    }
}

impl AppState {
    /// Wire resolver, fetcher and (in browser mode) the browser pool from config.
    pub fn new(config: ScoutConfig, http_client: reqwest::Client) -> Self {
        let browser_pool = match config.resolve_mode() {
            FetchMode::Browser => Some(BrowserPool::discover()),
            FetchMode::Http => None,
        };
        let resolver = Resolver::from_config(&config, &http_client, browser_pool.clone());
        let fetcher = ContentFetcher::new(&config, http_client, browser_pool.clone());
        Self {
            resolver: Arc::new(resolver),
            fetcher: Arc::new(fetcher),
            browser_pool,
            config: Arc::new(config),
        }
    }

    /// Assemble state from prebuilt parts (custom provider chains, tests).
    pub fn with_parts(config: ScoutConfig, resolver: Resolver, fetcher: ContentFetcher) -> Self {
        Self {
            resolver: Arc::new(resolver),
            fetcher: Arc::new(fetcher),
            browser_pool: None,
            config: Arc::new(config),
        }
    }

    /// Close the browser, if one was started.
    pub async fn shutdown(&self) {
        if let Some(pool) = self.browser_pool.as_ref() {
            pool.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_mode_has_no_browser_pool() {
        let cfg = ScoutConfig {
            mode: Some("http".into()),
            ..Default::default()
        };
        let state = AppState::new(cfg, reqwest::Client::new());
        assert!(state.browser_pool.is_none());
        assert_eq!(state.fetcher.mode(), FetchMode::Http);
        assert!(format!("{:?}", state).contains("google"));
    }

    #[test]
    fn browser_mode_owns_a_pool() {
        let cfg = ScoutConfig {
            mode: Some("browser".into()),
            ..Default::default()
        };
        let state = AppState::new(cfg, reqwest::Client::new());
        assert!(state.browser_pool.is_some());
        assert_eq!(state.fetcher.mode(), FetchMode::Browser);
    }
}
