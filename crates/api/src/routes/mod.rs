//! API route definitions.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;

use kasira_shared::EngineError;

use crate::AppState;

pub mod health;
pub mod invoices;
pub mod transfers;
pub mod wallets;

/// Creates the API router with all routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(wallets::routes())
        .merge(invoices::routes())
        .merge(transfers::routes())
}

/// Maps an engine error to its HTTP response.
pub(crate) fn error_response(err: &EngineError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(json!({
            "error": err.error_code(),
            "message": err.to_string(),
        })),
    )
        .into_response()
}
