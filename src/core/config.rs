use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ScoutConfig: file-based config loader (chord-scout.json) with env-var fallback
// ---------------------------------------------------------------------------

pub const ENV_CONFIG_PATH: &str = "CHORD_SCOUT_CONFIG";
pub const ENV_CHROME_EXECUTABLE: &str = "CHROME_EXECUTABLE";

const DEFAULT_MIRROR_BASE_URL: &str = "https://r.jina.ai";

/// How search pages and target pages are retrieved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Plain HTTP GET with browser-like headers, text mirror as fallback.
    #[default]
    Http,
    /// Headless Chromium through the shared `BrowserPool`.
    Browser,
}

impl FetchMode {
    pub fn parse_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "http" | "fetch" => Some(FetchMode::Http),
            "browser" | "chromium" | "cdp" => Some(FetchMode::Browser),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FetchMode::Http => "http",
            FetchMode::Browser => "browser",
        }
    }
}

/// Top-level config loaded from `chord-scout.json`. Every field is optional.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct ScoutConfig {
    /// `http` (default) or `browser`.
    pub mode: Option<String>,
    pub port: Option<u16>,
    /// Base URL of the text mirror. An explicit empty string disables the mirror.
    pub mirror_base_url: Option<String>,
    pub provider_timeout_ms: Option<u64>,
    pub mirror_timeout_ms: Option<u64>,
    pub page_timeout_ms: Option<u64>,
    pub render_timeout_ms: Option<u64>,
    /// Extra wait after DOMContentLoaded before capturing rendered HTML.
    pub render_settle_ms: Option<u64>,
    pub resolve_cache_ttl_secs: Option<u64>,
    /// How many ranked candidates the embedded endpoint may try in HTTP mode.
    pub max_embed_candidates: Option<usize>,
    pub accept_language: Option<String>,
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl ScoutConfig {
    /// Mode: JSON field → `CHORD_SCOUT_MODE` env var → `http`.
    pub fn resolve_mode(&self) -> FetchMode {
        self.mode
            .as_deref()
            .and_then(FetchMode::parse_str)
            .or_else(|| {
                std::env::var("CHORD_SCOUT_MODE")
                    .ok()
                    .and_then(|v| FetchMode::parse_str(&v))
            })
            .unwrap_or_default()
    }

    /// Mirror base URL: JSON field → `CHORD_SCOUT_MIRROR_URL` → `https://r.jina.ai`.
    ///
    /// Returns `None` when the mirror is explicitly disabled with an empty string.
    pub fn resolve_mirror_base_url(&self) -> Option<String> {
        let raw = match &self.mirror_base_url {
            Some(u) => u.clone(),
            None => std::env::var("CHORD_SCOUT_MIRROR_URL")
                .unwrap_or_else(|_| DEFAULT_MIRROR_BASE_URL.to_string()),
        };
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    pub fn resolve_provider_timeout(&self) -> Duration {
        let ms = self
            .provider_timeout_ms
            .or_else(|| env_u64("CHORD_SCOUT_PROVIDER_TIMEOUT_MS"))
            .unwrap_or(12_000);
        Duration::from_millis(ms.max(250))
    }

    /// Mirror search timeout. The mirror renders a whole SERP, so it gets more room.
    pub fn resolve_mirror_timeout(&self) -> Duration {
        let ms = self
            .mirror_timeout_ms
            .or_else(|| env_u64("CHORD_SCOUT_MIRROR_TIMEOUT_MS"))
            .unwrap_or(18_000);
        Duration::from_millis(ms.max(250))
    }

    /// Mirror page-snapshot timeout: the search timeout plus a little slack.
    pub fn resolve_mirror_page_timeout(&self) -> Duration {
        self.resolve_mirror_timeout() + Duration::from_secs(2)
    }

    pub fn resolve_page_timeout(&self) -> Duration {
        let ms = self
            .page_timeout_ms
            .or_else(|| env_u64("CHORD_SCOUT_PAGE_TIMEOUT_MS"))
            .unwrap_or(15_000);
        Duration::from_millis(ms.max(250))
    }

    pub fn resolve_render_timeout(&self) -> Duration {
        let ms = self
            .render_timeout_ms
            .or_else(|| env_u64("CHORD_SCOUT_RENDER_TIMEOUT_MS"))
            .unwrap_or(30_000);
        Duration::from_millis(ms.max(1_000))
    }

    pub fn resolve_render_settle(&self) -> Duration {
        let ms = self
            .render_settle_ms
            .or_else(|| env_u64("CHORD_SCOUT_RENDER_SETTLE_MS"))
            .unwrap_or(1_200);
        Duration::from_millis(ms)
    }

    pub fn resolve_cache_ttl(&self) -> Duration {
        let secs = self
            .resolve_cache_ttl_secs
            .or_else(|| env_u64("CHORD_SCOUT_CACHE_TTL_SECS"))
            .unwrap_or(300);
        Duration::from_secs(secs.max(1))
    }

    pub fn resolve_max_embed_candidates(&self) -> usize {
        self.max_embed_candidates
            .or_else(|| env_u64("CHORD_SCOUT_MAX_CANDIDATES").map(|n| n as usize))
            .unwrap_or(5)
            .max(1)
    }

    /// Accept-Language: JSON field → `SEARCH_ACCEPT_LANGUAGE` → `en-US,en;q=0.9`.
    pub fn resolve_accept_language(&self) -> String {
        if let Some(l) = &self.accept_language {
            if !l.trim().is_empty() {
                return l.trim().to_string();
            }
        }
        std::env::var("SEARCH_ACCEPT_LANGUAGE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "en-US,en;q=0.9".to_string())
    }

    /// Listen port: JSON field → `CHORD_SCOUT_PORT` / `PORT` env → 8080.
    pub fn resolve_port(&self) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        for k in ["CHORD_SCOUT_PORT", "PORT"] {
            if let Ok(v) = std::env::var(k) {
                if let Ok(p) = v.trim().parse::<u16>() {
                    return p;
                }
            }
        }
        8080
    }
}

/// Load `chord-scout.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `CHORD_SCOUT_CONFIG` env var path
/// 2. `./chord-scout.json`
/// 3. `../chord-scout.json`
///
/// Missing file → `ScoutConfig::default()` (silent, all env-var fallbacks apply).
/// Parse error → log a warning, return `ScoutConfig::default()`.
pub fn load_scout_config() -> ScoutConfig {
    let candidates: Vec<std::path::PathBuf> = {
        let mut v = vec![
            std::path::PathBuf::from("chord-scout.json"),
            std::path::PathBuf::from("../chord-scout.json"),
        ];
        if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
            v.insert(0, std::path::PathBuf::from(env_path));
        }
        v
    };

    for path in &candidates {
        match std::fs::read_to_string(path) {
            Ok(contents) => return parse_scout_config(&contents, path),
            Err(_) => continue, // not at this path, try next
        }
    }

    ScoutConfig::default()
}

fn parse_scout_config(contents: &str, path: &Path) -> ScoutConfig {
    match serde_json::from_str::<ScoutConfig>(contents) {
        Ok(cfg) => {
            tracing::info!("chord-scout.json loaded from {}", path.display());
            cfg
        }
        Err(e) => {
            tracing::warn!(
                "chord-scout.json parse error at {}: {}, using defaults",
                path.display(),
                e
            );
            ScoutConfig::default()
        }
    }
}

/// Optional override for the Chromium-family browser executable.
///
/// Only returns a value when `CHROME_EXECUTABLE` is set to an existing path.
pub fn chrome_executable_override() -> Option<String> {
    let p = std::env::var(ENV_CHROME_EXECUTABLE).ok()?;
    let p = p.trim();
    if p.is_empty() {
        return None;
    }
    if Path::new(p).exists() {
        Some(p.to_string())
    } else {
        None
    }
}
