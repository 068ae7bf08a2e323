use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ResolveError;

/// A trimmed, non-empty free-text search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    text: String,
}

impl Query {
    /// Trim and validate raw input. Blank input is rejected.
    pub fn parse(raw: &str) -> Result<Self, ResolveError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(ResolveError::InvalidQuery);
        }
        Ok(Self {
            text: text.to_string(),
        })
    }

    /// The query shape sent for a playing track: `"<artist> <title> chords"`.
    pub fn for_track(artist: &str, title: &str) -> Result<Self, ResolveError> {
        let artist = artist.split_whitespace().collect::<Vec<_>>().join(" ");
        let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
        Self::parse(&format!("{} {} chords", artist, title))
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Case-folded form used as the cache key.
    pub fn cache_key(&self) -> String {
        self.text.to_lowercase()
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// A decoded absolute http(s) result link plus where it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub url: String,
    /// Provider label, e.g. `google`, `bing`, `mirror`.
    pub provider: &'static str,
    /// Position within that provider's result list.
    pub position: usize,
}

impl Candidate {
    pub fn new(url: impl Into<String>, provider: &'static str, position: usize) -> Self {
        Self {
            url: url.into(),
            provider,
            position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: i32,
    /// Discovery order across the pooled candidate list; used as the stable tie-break.
    pub index: usize,
}

/// Outcome of a successful resolution. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedResult {
    pub query: String,
    pub chosen_url: String,
    /// Ranked acceptable URLs from the winning provider, `chosen_url` first.
    pub candidates: Vec<String>,
    pub provider: &'static str,
    pub resolved_at: DateTime<Utc>,
}

// ── HTTP payloads ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct QueryParams {
    #[serde(default)]
    pub query: Option<String>,
}

impl QueryParams {
    /// Read `query` from a raw query string. A repeated key keeps its first value.
    pub fn from_raw(raw: Option<&str>) -> Self {
        let query = raw.and_then(|qs| {
            url::form_urlencoded::parse(qs.as_bytes())
                .find(|(k, _)| k == "query")
                .map(|(_, v)| v.into_owned())
        });
        Self { query }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    pub query: String,
    pub first_result_url: String,
    #[serde(default)]
    pub candidates: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    #[serde(default)]
    pub ts: i64,
}
