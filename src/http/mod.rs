use std::any::Any;

use axum::extract::DefaultBodyLimit;
use axum::response::Response;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

mod api;
mod auth;
mod error;
mod handlers;
mod pages;
mod routes;
mod upload;
mod views;

pub use auth::{AdminToken, AuthUser, SessionUser, SESSION_COOKIE};
pub use error::{AppError, PageError};

pub fn router(state: AppState) -> Router {
    let body_limit = state.upload_max_bytes;

    Router::new()
        .merge(routes::ops())
        .merge(routes::accounts())
        .merge(routes::api())
        .merge(routes::pages())
        .fallback(handlers::fallback)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "request handler panicked");
    error::server_error_page()
}
