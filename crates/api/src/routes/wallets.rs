//! Wallet provisioning, funding, and ledger read routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use kasira_core::ledger::LedgerEntry;
use kasira_core::wallet::{Wallet, WalletLimits, WalletMode};
use kasira_shared::types::{Currency, CustomerId, IdempotencyKey, PageRequest, WalletId};
use kasira_shared::EngineError;
use kasira_store::CreateWalletInput;

use crate::AppState;
use crate::routes::error_response;

/// Creates the wallet routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/wallets", post(create_wallet))
        .route("/wallets/{wallet_id}", get(get_wallet))
        .route("/wallets/{wallet_id}/deposit", post(deposit))
        .route("/wallets/{wallet_id}/withdraw", post(withdraw))
        .route("/wallets/{wallet_id}/entries", get(list_entries))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for provisioning a wallet.
#[derive(Debug, Deserialize)]
pub struct CreateWalletRequest {
    /// Owning customer ID.
    pub owner: Uuid,
    /// Wallet mode: "ephemeral", "persistent", or "adaptive".
    pub mode: String,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Cap on a single payment (minor units).
    pub per_transaction_max: Option<String>,
    /// Cap on daily volume (minor units).
    pub daily_max: Option<String>,
    /// Cap on monthly volume (minor units).
    pub monthly_max: Option<String>,
    /// Conversion threshold for adaptive wallets (minor units).
    pub adaptive_threshold: Option<String>,
}

/// Request body for deposits and withdrawals.
#[derive(Debug, Deserialize)]
pub struct MoneyMovementRequest {
    /// Amount in minor units.
    pub amount: String,
    /// Retry-safety key.
    pub idempotency_key: String,
}

/// Response for a wallet.
#[derive(Debug, Serialize)]
pub struct WalletResponse {
    /// Wallet ID.
    pub id: Uuid,
    /// Owning customer ID.
    pub owner: Uuid,
    /// Wallet mode.
    pub mode: String,
    /// Currency code.
    pub currency: String,
    /// Administrative status.
    pub status: String,
    /// Available balance.
    pub available: String,
    /// Pending balance.
    pub pending: String,
    /// Reserved balance.
    pub reserved: String,
    /// Cap on a single payment.
    pub per_transaction_max: Option<String>,
    /// Cap on daily volume.
    pub daily_max: Option<String>,
    /// Cap on monthly volume.
    pub monthly_max: Option<String>,
    /// Conversion threshold, for adaptive wallets.
    pub adaptive_threshold: Option<String>,
    /// Record version.
    pub version: u64,
}

/// Response for a ledger entry.
#[derive(Debug, Serialize)]
pub struct EntryResponse {
    /// Entry ID.
    pub id: Uuid,
    /// Movement kind.
    pub kind: String,
    /// Moved amount.
    pub amount: String,
    /// Available balance after the entry.
    pub available_after: String,
    /// Reserved balance after the entry.
    pub reserved_after: String,
    /// Related invoice, if any.
    pub invoice_id: Option<Uuid>,
    /// Transfer correlation, if any.
    pub correlation_id: Option<Uuid>,
    /// Append time.
    pub timestamp: String,
}

fn wallet_response(wallet: &Wallet) -> WalletResponse {
    WalletResponse {
        id: wallet.id.into_inner(),
        owner: wallet.owner.into_inner(),
        mode: wallet.mode.as_str().to_string(),
        currency: wallet.currency.to_string(),
        status: wallet.status.as_str().to_string(),
        available: wallet.balances.available.to_string(),
        pending: wallet.balances.pending.to_string(),
        reserved: wallet.balances.reserved.to_string(),
        per_transaction_max: wallet.limits.per_transaction_max.map(|d| d.to_string()),
        daily_max: wallet.limits.daily_max.map(|d| d.to_string()),
        monthly_max: wallet.limits.monthly_max.map(|d| d.to_string()),
        adaptive_threshold: wallet.adaptive_threshold.map(|d| d.to_string()),
        version: wallet.version,
    }
}

fn entry_response(entry: &LedgerEntry) -> EntryResponse {
    EntryResponse {
        id: entry.id.into_inner(),
        kind: entry.kind.as_str().to_string(),
        amount: entry.amount.to_string(),
        available_after: entry.balance_after.available.to_string(),
        reserved_after: entry.balance_after.reserved.to_string(),
        invoice_id: entry.invoice_id.map(kasira_shared::types::InvoiceId::into_inner),
        correlation_id: entry
            .correlation_id
            .map(kasira_shared::types::TransferId::into_inner),
        timestamp: entry.timestamp.to_rfc3339(),
    }
}

/// Parses a decimal amount field, mapping failures to a validation error.
pub(crate) fn parse_amount(field: &str, value: &str) -> Result<Decimal, EngineError> {
    Decimal::from_str(value)
        .map_err(|_| EngineError::Validation(format!("{field} is not a valid amount: {value}")))
}

fn parse_optional_amount(
    field: &str,
    value: Option<&String>,
) -> Result<Option<Decimal>, EngineError> {
    value.map(|v| parse_amount(field, v)).transpose()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST `/wallets` - Provision a wallet.
async fn create_wallet(
    State(state): State<AppState>,
    Json(payload): Json<CreateWalletRequest>,
) -> impl IntoResponse {
    let mode = match payload.mode.to_lowercase().as_str() {
        "ephemeral" => WalletMode::Ephemeral,
        "persistent" => WalletMode::Persistent,
        "adaptive" => WalletMode::Adaptive,
        other => {
            return error_response(&EngineError::Validation(format!(
                "unknown wallet mode: {other}"
            )));
        }
    };
    let currency = match Currency::from_str(&payload.currency) {
        Ok(currency) => currency,
        Err(reason) => return error_response(&EngineError::Validation(reason)),
    };

    let limits = match (|| {
        Ok::<_, EngineError>(WalletLimits {
            per_transaction_max: parse_optional_amount(
                "per_transaction_max",
                payload.per_transaction_max.as_ref(),
            )?,
            daily_max: parse_optional_amount("daily_max", payload.daily_max.as_ref())?,
            monthly_max: parse_optional_amount("monthly_max", payload.monthly_max.as_ref())?,
        })
    })() {
        Ok(limits) => limits,
        Err(err) => return error_response(&err),
    };
    let adaptive_threshold =
        match parse_optional_amount("adaptive_threshold", payload.adaptive_threshold.as_ref()) {
            Ok(threshold) => threshold,
            Err(err) => return error_response(&err),
        };

    match state.service.create_wallet(CreateWalletInput {
        owner: CustomerId::from_uuid(payload.owner),
        mode,
        currency,
        limits,
        adaptive_threshold,
    }) {
        Ok(wallet) => {
            info!(wallet_id = %wallet.id, "wallet created via API");
            (StatusCode::CREATED, Json(wallet_response(&wallet))).into_response()
        }
        Err(err) => error_response(&err),
    }
}

/// GET `/wallets/{wallet_id}` - Current balances, mode, status, limits.
async fn get_wallet(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.service.get_wallet(WalletId::from_uuid(wallet_id)) {
        Ok(wallet) => (StatusCode::OK, Json(wallet_response(&wallet))).into_response(),
        Err(err) => error_response(&err),
    }
}

/// POST `/wallets/{wallet_id}/deposit` - Fund a wallet.
async fn deposit(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
    Json(payload): Json<MoneyMovementRequest>,
) -> impl IntoResponse {
    let amount = match parse_amount("amount", &payload.amount) {
        Ok(amount) => amount,
        Err(err) => return error_response(&err),
    };
    match state.service.deposit(
        WalletId::from_uuid(wallet_id),
        amount,
        &IdempotencyKey::new(payload.idempotency_key),
    ) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => error_response(&err),
    }
}

/// POST `/wallets/{wallet_id}/withdraw` - Withdraw available funds.
async fn withdraw(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
    Json(payload): Json<MoneyMovementRequest>,
) -> impl IntoResponse {
    let amount = match parse_amount("amount", &payload.amount) {
        Ok(amount) => amount,
        Err(err) => return error_response(&err),
    };
    match state.service.withdraw(
        WalletId::from_uuid(wallet_id),
        amount,
        &IdempotencyKey::new(payload.idempotency_key),
    ) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => error_response(&err),
    }
}

/// GET `/wallets/{wallet_id}/entries` - Paginated ledger log, oldest first.
async fn list_entries(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
    Query(page): Query<PageRequest>,
) -> impl IntoResponse {
    match state
        .service
        .wallet_entries(WalletId::from_uuid(wallet_id), page)
    {
        Ok(entries) => {
            let data: Vec<EntryResponse> = entries.data.iter().map(entry_response).collect();
            (
                StatusCode::OK,
                Json(serde_json::json!({ "data": data, "meta": entries.meta })),
            )
                .into_response()
        }
        Err(err) => error_response(&err),
    }
}
