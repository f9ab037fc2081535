//! Wallet-to-wallet transfer routes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use kasira_shared::types::{IdempotencyKey, WalletId};

use crate::AppState;
use crate::routes::error_response;
use crate::routes::wallets::parse_amount;

/// Creates the transfer routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/transfers", post(transfer))
}

/// Request body for `/transfers`.
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    /// Wallet debited by the transfer.
    pub source_wallet_id: Uuid,
    /// Wallet credited by the transfer.
    pub target_wallet_id: Uuid,
    /// Amount in minor units.
    pub amount: String,
    /// Retry-safety key.
    pub idempotency_key: String,
}

/// POST `/transfers` - Move funds between two wallets atomically.
async fn transfer(
    State(state): State<AppState>,
    Json(payload): Json<TransferRequest>,
) -> impl IntoResponse {
    let amount = match parse_amount("amount", &payload.amount) {
        Ok(amount) => amount,
        Err(err) => return error_response(&err),
    };

    match state.service.transfer(
        WalletId::from_uuid(payload.source_wallet_id),
        WalletId::from_uuid(payload.target_wallet_id),
        amount,
        &IdempotencyKey::new(payload.idempotency_key),
    ) {
        Ok(outcome) => {
            info!(transfer_id = %outcome.transfer_id, "transfer applied");
            (StatusCode::OK, Json(outcome)).into_response()
        }
        Err(err) => error_response(&err),
    }
}
