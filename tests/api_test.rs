//! End-to-end tests for the HTTP surface.
//!
//! Search providers are in-process fakes; target pages and the text mirror
//! are wiremock servers. Nothing here touches the public internet.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chord_scout::config::ScoutConfig;
use chord_scout::error::ProviderError;
use chord_scout::fetch::ContentFetcher;
use chord_scout::search::{Provider, Resolver};
use chord_scout::{api, AppState, Candidate};

struct StaticProvider {
    urls: Vec<String>,
    calls: AtomicUsize,
}

#[async_trait]
impl Provider for StaticProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(2)
    }

    async fn fetch_candidates(&self, _query: &str) -> Result<Vec<Candidate>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .urls
            .iter()
            .enumerate()
            .map(|(i, u)| Candidate::new(u.clone(), "google", i))
            .collect())
    }
}

fn app(urls: Vec<String>, mirror: Option<String>) -> (Router, Arc<StaticProvider>) {
    let provider = Arc::new(StaticProvider {
        urls,
        calls: AtomicUsize::new(0),
    });
    let config = ScoutConfig {
        mode: Some("http".into()),
        mirror_base_url: Some(mirror.unwrap_or_default()),
        page_timeout_ms: Some(3_000),
        mirror_timeout_ms: Some(3_000),
        ..Default::default()
    };
    let client = reqwest::Client::new();
    let providers = vec![provider.clone() as Arc<dyn Provider>];
    let resolver = Resolver::new(providers, Duration::from_secs(300));
    let fetcher = ContentFetcher::new(&config, client, None);
    let state = AppState::with_parts(config, resolver, fetcher);
    (api::router(Arc::new(state)), provider)
}

async fn get(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
    let resp = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8_lossy(&bytes).to_string())
}

#[tokio::test]
async fn health_reports_ok_with_timestamp() {
    let (app, _) = app(vec![], None);
    let (status, headers, body) = get(app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["ok"], true);
    assert!(json["ts"].as_i64().unwrap() > 1_600_000_000_000);
}

#[tokio::test]
async fn resolve_requires_query() {
    for uri in ["/api/chords/resolve", "/api/chords/resolve?query=%20%20"] {
        let (app, provider) = app(vec!["https://www.tab4u.com/x".into()], None);
        let (status, _, body) = get(app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, r#"{"error":"Missing query"}"#);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn resolve_returns_first_result_and_candidates() {
    let (app, _) = app(
        vec![
            "https://www.youtube.com/watch?v=YQHsXMglC9A".into(),
            "https://www.tab4u.com/tabs/songs/adele-hello.html".into(),
            "https://example.org/adele".into(),
        ],
        None,
    );
    let (status, headers, body) = get(app, "/api/chords/resolve?query=Adele%20Hello").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["query"], "Adele Hello");
    assert_eq!(
        json["firstResultUrl"],
        "https://www.tab4u.com/tabs/songs/adele-hello.html"
    );
    assert_eq!(json["candidates"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn repeated_query_key_uses_first_value() {
    let (app, provider) = app(
        vec!["https://www.tab4u.com/tabs/songs/adele-hello.html".into()],
        None,
    );
    let (status, headers, body) =
        get(app.clone(), "/api/chords/resolve?query=Adele%20Hello&query=Other").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["query"], "Adele Hello");

    // Blank first value: still the HTML error page, still no-store.
    let (status, headers, body) = get(app, "/api/chords/embedded?query=&query=Hello").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert!(body.contains("Missing query"));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cached_resolve_echoes_current_query() {
    let (app, provider) = app(
        vec!["https://www.tab4u.com/tabs/songs/adele-hello.html".into()],
        None,
    );
    let (_, _, first) = get(app.clone(), "/api/chords/resolve?query=Adele%20Hello").await;
    let (status, _, second) = get(app, "/api/chords/resolve?query=%20adele%20HELLO%20").await;
    assert_eq!(status, StatusCode::OK);

    let first: serde_json::Value = serde_json::from_str(&first).unwrap();
    let second: serde_json::Value = serde_json::from_str(&second).unwrap();
    assert_eq!(first["query"], "Adele Hello");
    assert_eq!(second["query"], "adele HELLO");
    assert_eq!(second["firstResultUrl"], first["firstResultUrl"]);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn resolve_without_acceptable_result_is_bad_gateway() {
    let (app, _) = app(vec!["https://www.bing.com/search?q=x".into()], None);
    let (status, _, body) = get(app, "/api/chords/resolve?query=nothing").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["query"], "nothing");
    assert_eq!(json["error"], "Could not resolve first search result");
}

#[tokio::test]
async fn embedded_requires_query() {
    let (app, _) = app(vec![], None);
    let (status, headers, body) = get(app, "/api/chords/embedded").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert!(body.contains("Missing query"));
}

#[tokio::test]
async fn embedded_serves_sanitized_target() {
    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/adele-hello-chords"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(
                    "<html><head><script>track()</script></head><body><pre>Am F C G</pre></body></html>", "text/html; charset=utf-8"),
        )
        .mount(&target)
        .await;

    let url = format!("{}/adele-hello-chords", target.uri());
    let (app, _) = app(vec![url.clone()], None);
    let (status, headers, body) = get(app, "/api/chords/embedded?query=Adele%20Hello").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    assert!(body.contains("<pre>Am F C G</pre>"));
    assert!(body.contains(&format!(r#"<base href="{}">"#, url)));
    assert!(!body.to_lowercase().contains("<script"));
}

#[tokio::test]
async fn embedded_target_503_without_mirror_is_bad_gateway() {
    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&target)
        .await;

    let (app, _) = app(vec![format!("{}/adele-hello", target.uri())], None);
    let (status, headers, body) = get(app, "/api/chords/embedded?query=Adele%20Hello").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    assert!(body.contains("503"), "{body}");
}

#[tokio::test]
async fn embedded_target_503_is_rescued_by_mirror() {
    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&target)
        .await;

    let mirror = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("Hello - Adele\n[Verse]\nFm  Db  Ab  Eb"),
        )
        .expect(1)
        .mount(&mirror)
        .await;

    let (app, _) = app(vec![format!("{}/adele-hello", target.uri())], Some(mirror.uri()));
    let (status, _, body) = get(app, "/api/chords/embedded?query=Adele%20Hello").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains("Fm  Db  Ab  Eb"));
    assert!(body.contains("Text snapshot of"));
}

#[tokio::test]
async fn preflight_is_answered_for_any_origin() {
    let (app, _) = app(vec![], None);
    let resp = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/chords/resolve")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
