//! Invoice evaluation and release routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use kasira_core::invoice::{InvoiceDraft, LineItem};
use kasira_shared::types::{Currency, CustomerId, IdempotencyKey, InvoiceId, WalletId};
use kasira_shared::EngineError;
use kasira_store::EvaluateAndApplyInput;

use crate::AppState;
use crate::routes::error_response;
use crate::routes::wallets::parse_amount;

/// Creates the invoice routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/invoices/evaluate", post(evaluate_and_apply))
        .route("/invoices/{invoice_id}/release", post(release))
}

// ============================================================================
// Request Types
// ============================================================================

/// One invoice line in a request.
#[derive(Debug, Deserialize)]
pub struct LineItemRequest {
    /// What is being billed.
    pub description: String,
    /// Billed quantity.
    pub quantity: u32,
    /// Price per unit in minor units.
    pub unit_price: String,
}

/// The invoice fields of an evaluate request.
#[derive(Debug, Deserialize)]
pub struct InvoiceRequest {
    /// Reference number, unique per wallet owner.
    pub reference: String,
    /// Total amount in minor units.
    pub amount: String,
    /// ISO 4217 currency code.
    pub currency: String,
    /// The billed customer.
    pub customer: Uuid,
    /// Payment due date (YYYY-MM-DD).
    pub due_date: NaiveDate,
    /// Ordered line items.
    #[serde(default)]
    pub line_items: Vec<LineItemRequest>,
}

/// Request body for `/invoices/evaluate`.
#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    /// The wallet the invoice draws on.
    pub wallet_id: Uuid,
    /// The invoice to evaluate.
    pub invoice: InvoiceRequest,
    /// Amount to capture now; defaults to the full remaining amount.
    pub capture_amount: Option<String>,
    /// Retry-safety key.
    pub idempotency_key: String,
}

/// Request body for `/invoices/{invoice_id}/release`.
#[derive(Debug, Deserialize)]
pub struct ReleaseRequest {
    /// Retry-safety key.
    pub idempotency_key: String,
}

fn build_draft(request: InvoiceRequest) -> Result<InvoiceDraft, EngineError> {
    let currency = Currency::from_str(&request.currency).map_err(EngineError::Validation)?;
    let amount = parse_amount("amount", &request.amount)?;
    let line_items = request
        .line_items
        .into_iter()
        .enumerate()
        .map(|(index, line)| {
            Ok(LineItem {
                description: line.description,
                quantity: line.quantity,
                unit_price: parse_amount(&format!("line_items[{index}].unit_price"), &line.unit_price)?,
            })
        })
        .collect::<Result<Vec<_>, EngineError>>()?;

    Ok(InvoiceDraft {
        reference: request.reference,
        amount,
        currency,
        customer: CustomerId::from_uuid(request.customer),
        line_items,
        due_date: request.due_date,
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// POST `/invoices/evaluate` - Run the rule chain and, on accept, apply
/// the reserve+capture sequence.
async fn evaluate_and_apply(
    State(state): State<AppState>,
    Json(payload): Json<EvaluateRequest>,
) -> impl IntoResponse {
    let draft = match build_draft(payload.invoice) {
        Ok(draft) => draft,
        Err(err) => return error_response(&err),
    };
    let capture_amount = match payload
        .capture_amount
        .as_deref()
        .map(|v| parse_amount("capture_amount", v))
        .transpose()
    {
        Ok(capture) => capture,
        Err(err) => return error_response(&err),
    };

    let input = EvaluateAndApplyInput {
        wallet_id: WalletId::from_uuid(payload.wallet_id),
        draft,
        capture_amount,
        idempotency_key: IdempotencyKey::new(payload.idempotency_key),
    };

    match state.service.evaluate_and_apply(&input) {
        Ok(outcome) => {
            info!(wallet_id = %input.wallet_id, "invoice evaluated");
            (StatusCode::OK, Json(outcome)).into_response()
        }
        Err(err) => error_response(&err),
    }
}

/// POST `/invoices/{invoice_id}/release` - Release the outstanding
/// reservation and cancel the invoice.
async fn release(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<ReleaseRequest>,
) -> impl IntoResponse {
    match state.service.release(
        InvoiceId::from_uuid(invoice_id),
        &IdempotencyKey::new(payload.idempotency_key),
    ) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => error_response(&err),
    }
}
