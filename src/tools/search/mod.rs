//! Resolution: turn a free-text query into the URL of a chord/tab page.
//!
//! Providers run one after another in a fixed priority order. The first
//! provider that yields an acceptable candidate wins; later providers are
//! never consulted. Provider failures are logged and swallowed here.

pub mod engines;
pub mod ranking;

use async_trait::async_trait;
use chrono::Utc;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::config::{FetchMode, ScoutConfig};
use crate::core::error::{EnvironmentError, ProviderError, ResolveError};
use crate::scraping::browser_manager::BrowserPool;
use crate::types::{Candidate, Query, ResolvedResult};

use engines::bing::BingSearch;
use engines::duckduckgo::DuckDuckGoSearch;
use engines::google::GoogleSearch;
use engines::mirror::MirrorSearch;
use engines::rendered::RenderedSearch;
use engines::Engine;

/// How many ranked URLs a resolution keeps for the fetcher to fall back on.
pub const MAX_RESOLVED_CANDIDATES: usize = 5;

const MAX_CACHE_ENTRIES: u64 = 10_000;

/// One search source: an engine fetched over HTTP, through a browser, or
/// through the text mirror.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short stable label used in logs and in [`ResolvedResult::provider`].
    fn name(&self) -> &'static str;

    /// Upper bound for one `fetch_candidates` call.
    fn timeout(&self) -> Duration;

    /// Organic result links for `query`, in the engine's order.
    async fn fetch_candidates(&self, query: &str) -> Result<Vec<Candidate>, ProviderError>;
}

/// The provider chain for a deployment mode.
///
/// `pool` is only consulted in browser mode; without it the rendered
/// providers are skipped and only the text mirror remains.
pub fn build_providers(
    config: &ScoutConfig,
    client: &reqwest::Client,
    pool: Option<Arc<BrowserPool>>,
) -> Vec<Arc<dyn Provider>> {
    let accept_language = config.resolve_accept_language();
    let timeout = config.resolve_provider_timeout();
    let mut providers: Vec<Arc<dyn Provider>> = Vec::new();

    match (config.resolve_mode(), pool) {
        (FetchMode::Browser, Some(pool)) => {
            let settle = config.resolve_render_settle();
            let render_timeout = config.resolve_render_timeout();
            for engine in [Engine::Google, Engine::Bing, Engine::DuckDuckGo] {
                providers.push(Arc::new(RenderedSearch::new(
                    engine,
                    pool.clone(),
                    settle,
                    render_timeout,
                )));
            }
        }
        (FetchMode::Browser, None) => {
            warn!("browser mode without a browser pool; only the text mirror will be searched");
        }
        (FetchMode::Http, _) => {
            providers.push(Arc::new(GoogleSearch::new(
                client.clone(),
                accept_language.clone(),
                timeout,
            )));
            providers.push(Arc::new(BingSearch::new(
                client.clone(),
                accept_language.clone(),
                timeout,
            )));
            providers.push(Arc::new(DuckDuckGoSearch::new(
                client.clone(),
                accept_language.clone(),
                timeout,
            )));
        }
    }

    if let Some(base) = config.resolve_mirror_base_url() {
        providers.push(Arc::new(MirrorSearch::new(
            client.clone(),
            base,
            accept_language,
            config.resolve_mirror_timeout(),
        )));
    }

    providers
}

/// Resolution Orchestrator with its TTL cache.
pub struct Resolver {
    providers: Vec<Arc<dyn Provider>>,
    cache: Cache<String, ResolvedResult>,
}

impl Resolver {
    pub fn new(providers: Vec<Arc<dyn Provider>>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_CACHE_ENTRIES)
            .time_to_live(ttl)
            .build();
        Self { providers, cache }
    }

    pub fn from_config(
        config: &ScoutConfig,
        client: &reqwest::Client,
        pool: Option<Arc<BrowserPool>>,
    ) -> Self {
        Self::new(
            build_providers(config, client, pool),
            config.resolve_cache_ttl(),
        )
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    async fn run_provider(
        &self,
        provider: &dyn Provider,
        query: &str,
    ) -> Result<Vec<Candidate>, ProviderError> {
        let timeout = provider.timeout();
        match tokio::time::timeout(timeout, provider.fetch_candidates(query)).await {
            Ok(res) => res,
            Err(_) => Err(ProviderError::Timeout(timeout)),
        }
    }

    /// Resolve `raw_query` to the best acceptable result URL.
    pub async fn resolve(&self, raw_query: &str) -> Result<ResolvedResult, ResolveError> {
        let query = Query::parse(raw_query)?;
        let key = query.cache_key();

        if let Some(hit) = self.cache.get(&key).await {
            debug!("resolve cache hit for '{}'", query);
            return Ok(hit);
        }

        let tokens = ranking::query_tokens(query.as_str());
        let mut environment: Option<EnvironmentError> = None;

        for provider in &self.providers {
            let name = provider.name();
            let candidates = match self.run_provider(provider.as_ref(), query.as_str()).await {
                Ok(c) => c,
                Err(e) => {
                    warn!("provider '{}' failed: {}", name, e);
                    if let ProviderError::Environment(env) = e {
                        environment.get_or_insert(env);
                    }
                    continue;
                }
            };

            let found = candidates.len();
            let ranked = ranking::rank(candidates, &tokens);
            let Some(best) = ranking::select_best(&ranked) else {
                debug!(
                    "provider '{}' returned {} links, none acceptable",
                    name, found
                );
                continue;
            };
            let chosen = best.candidate.url.clone();
            let shortlist: Vec<String> = ranked
                .into_iter()
                .filter(|c| c.score > ranking::ACCEPT_THRESHOLD)
                .take(MAX_RESOLVED_CANDIDATES)
                .map(|c| c.candidate.url)
                .collect();

            info!("resolved '{}' via {}: {}", query, name, chosen);
            let result = ResolvedResult {
                query: query.as_str().to_string(),
                chosen_url: chosen,
                candidates: shortlist,
                provider: name,
                resolved_at: Utc::now(),
            };
            self.cache.insert(key, result.clone()).await;
            return Ok(result);
        }

        match environment {
            Some(env) => Err(ResolveError::Environment(env)),
            None => Err(ResolveError::NoResultFound),
        }
    }
}
