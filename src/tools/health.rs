//! Cached health probe for a chord-scout backend.
//!
//! A polling client asks "is the resolver up?" far more often than the
//! answer changes, so the boolean is cached for a short TTL.

use moka::future::Cache;
use std::time::Duration;
use tracing::debug;

use crate::types::HealthResponse;

pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(6);
pub const HEALTH_CACHE_TTL: Duration = Duration::from_secs(15);

pub struct HealthProbe {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
    cache: Cache<(), bool>,
}

impl HealthProbe {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self::with_timings(client, base_url, HEALTH_TIMEOUT, HEALTH_CACHE_TTL)
    }

    pub fn with_timings(
        client: reqwest::Client,
        base_url: impl Into<String>,
        timeout: Duration,
        ttl: Duration,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            timeout,
            cache: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
        }
    }

    async fn probe(&self) -> bool {
        let url = format!("{}/api/health", self.base_url);
        let resp = match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!("health probe {} failed: {}", url, e);
                return false;
            }
        };
        if resp.status() != reqwest::StatusCode::OK {
            debug!("health probe {} returned {}", url, resp.status());
            return false;
        }
        resp.json::<HealthResponse>()
            .await
            .map(|h| h.ok)
            .unwrap_or(false)
    }

    /// `true` when the backend answered `200 {"ok":true}` within the timeout.
    pub async fn check(&self) -> bool {
        if let Some(cached) = self.cache.get(&()).await {
            return cached;
        }
        let healthy = self.probe().await;
        self.cache.insert((), healthy).await;
        healthy
    }
}
