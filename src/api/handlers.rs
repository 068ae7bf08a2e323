use axum::{
    extract::{RawQuery, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Json, Response},
};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::core::error::ResolveError;
use crate::scraping::sanitize::{embed, error_page};
use crate::types::{ErrorResponse, HealthResponse, QueryParams, ResolveResponse, ResolvedResult};
use crate::AppState;

fn no_store(mut resp: Response) -> Response {
    resp.headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    resp
}

/// Trimmed `query` parameter; empty when absent. Never rejects the request.
fn raw_query(raw: Option<&str>) -> String {
    QueryParams::from_raw(raw)
        .query
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_string()
}

/// Run request work on its own task so a client disconnect does not cancel
/// provider calls or browser captures half-way; they end on their own timeouts.
async fn detached<T, F>(work: F) -> Result<T, ResolveError>
where
    F: Future<Output = Result<T, ResolveError>> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(res) => res,
        Err(e) => Err(ResolveError::Internal(e.to_string())),
    }
}

pub async fn health() -> Response {
    no_store(
        Json(HealthResponse {
            ok: true,
            ts: Utc::now().timestamp_millis(),
        })
        .into_response(),
    )
}

pub async fn resolve(State(state): State<Arc<AppState>>, RawQuery(raw): RawQuery) -> Response {
    let query = raw_query(raw.as_deref());

    let outcome: Result<ResolvedResult, ResolveError> = {
        let state = state.clone();
        let query = query.clone();
        detached(async move { state.resolver.resolve(&query).await }).await
    };

    let resp = match outcome {
        // Echo this request's query; a cache hit may have been stored under another casing.
        Ok(res) => (
            StatusCode::OK,
            Json(ResolveResponse {
                query: query.clone(),
                first_result_url: res.chosen_url,
                candidates: res.candidates,
            }),
        )
            .into_response(),
        Err(e) if e.is_client_error() => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                query: None,
                error: e.to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            warn!("resolve '{}' failed: {}", query, e);
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    query: Some(query),
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    };
    no_store(resp)
}

async fn load_embedded(state: Arc<AppState>, query: String) -> Result<String, ResolveError> {
    let resolved = state.resolver.resolve(&query).await?;
    let doc = state
        .fetcher
        .fetch_first_available(&resolved.candidates)
        .await?;
    info!(
        "embedding {} for '{}' ({})",
        doc.url,
        query,
        doc.source.as_str()
    );
    Ok(embed(&doc.html, &doc.url).into_string())
}

pub async fn embedded(State(state): State<Arc<AppState>>, RawQuery(raw): RawQuery) -> Response {
    let query = raw_query(raw.as_deref());

    let resp = match detached(load_embedded(state, query.clone())).await {
        Ok(html) => (StatusCode::OK, Html(html)).into_response(),
        Err(e) if e.is_client_error() => {
            (StatusCode::BAD_REQUEST, Html(error_page(&e.to_string()))).into_response()
        }
        Err(e) => {
            error!("embedded '{}' failed: {}", query, e);
            (StatusCode::BAD_GATEWAY, Html(error_page(&e.to_string()))).into_response()
        }
    };
    no_store(resp)
}
