//! Error taxonomy for resolution, provider and fetch failures.
//!
//! Provider errors never leave the orchestrator; they only decide whether the
//! next provider is consulted. Fetch and environment errors surface to callers
//! once every strategy is exhausted.

use std::time::Duration;

/// A missing external tool (headless browser) that the operator must install.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct EnvironmentError {
    pub message: String,
}

impl EnvironmentError {
    pub fn browser_missing() -> Self {
        Self {
            message: "No headless browser found. Install Brave, Chrome, or Chromium, or set \
                      CHROME_EXECUTABLE to its path, then restart chord-scout (or switch to \
                      CHORD_SCOUT_MODE=http)."
                .to_string(),
        }
    }
}

/// One provider call failed. Recovered locally by falling through to the next provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("search returned HTTP {0}")]
    Status(u16),

    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("blocked: {0}")]
    Blocked(String),

    #[error("no result links found")]
    NoLinks,

    #[error("browser automation failed: {0}")]
    Browser(String),

    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}

/// Target page retrieval failed.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Target site returned {0}")]
    Status(u16),

    #[error("Unsupported target content type: {0}")]
    UnsupportedContentType(String),

    #[error("Target request failed: {0}")]
    Http(String),

    #[error("Target request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Text mirror failed with {0}")]
    MirrorStatus(u16),

    #[error("Text mirror fallback is not configured")]
    MirrorDisabled,

    #[error("Browser render failed: {0}")]
    Browser(String),

    #[error("No candidate URL to fetch")]
    NoCandidates,

    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}

/// Failure of a whole resolve or embed request.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Missing query")]
    InvalidQuery,

    #[error("Could not resolve first search result")]
    NoResultFound,

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    #[error("Request handling failed: {0}")]
    Internal(String),
}

impl ResolveError {
    /// `true` when the caller sent a bad request rather than the backend failing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ResolveError::InvalidQuery)
    }
}

impl ProviderError {
    pub fn as_environment(&self) -> Option<&EnvironmentError> {
        match self {
            ProviderError::Environment(e) => Some(e),
            _ => None,
        }
    }
}

/// A browser capture used as a search provider.
impl From<FetchError> for ProviderError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Environment(env) => ProviderError::Environment(env),
            FetchError::Timeout(d) => ProviderError::Timeout(d),
            other => ProviderError::Browser(other.to_string()),
        }
    }
}
