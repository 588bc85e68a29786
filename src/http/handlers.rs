use axum::extract::State;
use axum::http::Uri;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::http::error::not_found_page;
use crate::http::{AdminToken, AppError};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    database: bool,
    redis: bool,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = state.db.ping().await.is_ok();
    let redis = state.cache.ping().await.is_ok();
    let status = if database && redis { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        database,
        redis,
    })
}

#[derive(Serialize)]
pub struct CacheClearResponse {
    pub cleared: usize,
}

pub async fn clear_page_cache(
    _admin: AdminToken,
    State(state): State<AppState>,
) -> Result<Json<CacheClearResponse>, AppError> {
    let cleared = state.cache.clear_pages().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to clear page cache");
        AppError::internal("failed to clear page cache")
    })?;

    tracing::info!(cleared, "page cache cleared");
    Ok(Json(CacheClearResponse { cleared }))
}

/// Unmatched routes: JSON under `/api/`, the HTML page elsewhere.
pub async fn fallback(uri: Uri) -> Response {
    let path = uri.path();
    if path.starts_with("/api/") {
        return AppError::not_found(format!("no route for {}", path)).into_response();
    }
    not_found_page(Some(path))
}
