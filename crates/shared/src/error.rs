//! Engine-wide error taxonomy.
//!
//! Every failure the engine reports to a caller is one of these kinds.
//! Each kind carries a stable error code for API responses and a
//! human-readable reason. `ConcurrencyConflict` is the only kind the
//! engine itself may retry internally before surfacing it.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::{Currency, CustomerId, InvoiceId, WalletId};

/// Result type alias using `EngineError`.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors reported by the wallet rule engine.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Malformed invoice, amount, or request parameter.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A compliance check failed with a hard block.
    #[error("Compliance check {check} failed: {reason}")]
    ComplianceBlocked {
        /// Name of the failing check (KYC, AML, Sanctions).
        check: String,
        /// Reason reported by the verification service.
        reason: String,
    },

    /// A spending limit was violated.
    #[error("Spending limit exceeded: {0}")]
    LimitExceeded(String),

    /// The wallet does not hold enough available funds.
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Amount the operation needed.
        requested: Decimal,
        /// Amount currently available.
        available: Decimal,
    },

    /// The wallet is restricted or frozen and rejects mutations.
    #[error("Wallet {wallet_id} is {status}")]
    WalletInactive {
        /// The inactive wallet.
        wallet_id: WalletId,
        /// Its current status ("restricted" or "frozen").
        status: String,
    },

    /// An invoice with this reference already exists for the owner.
    #[error("Duplicate invoice reference: {0}")]
    DuplicateInvoiceReference(String),

    /// Lock or version contention; safe for the caller to retry.
    #[error("Concurrent modification detected, retry the operation")]
    ConcurrencyConflict,

    /// An external compliance verification call timed out.
    #[error("Compliance check {0} timed out")]
    ComplianceTimeout(String),

    /// Submitted currency does not match the wallet currency.
    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch {
        /// The wallet's currency.
        expected: Currency,
        /// The currency the caller submitted.
        actual: Currency,
    },

    /// Wallet lookup miss.
    #[error("Wallet not found: {0}")]
    WalletNotFound(WalletId),

    /// Invoice lookup miss.
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(InvoiceId),

    /// Customer lookup miss.
    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),
}

impl EngineError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::CurrencyMismatch { .. } => 400,
            Self::WalletNotFound(_) | Self::InvoiceNotFound(_) | Self::CustomerNotFound(_) => 404,
            Self::DuplicateInvoiceReference(_) | Self::ConcurrencyConflict => 409,
            Self::ComplianceBlocked { .. }
            | Self::LimitExceeded(_)
            | Self::InsufficientBalance { .. }
            | Self::WalletInactive { .. } => 422,
            Self::ComplianceTimeout(_) => 504,
        }
    }

    /// Returns the stable error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ComplianceBlocked { .. } => "COMPLIANCE_BLOCKED",
            Self::LimitExceeded(_) => "LIMIT_EXCEEDED",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::WalletInactive { .. } => "WALLET_INACTIVE",
            Self::DuplicateInvoiceReference(_) => "DUPLICATE_INVOICE_REFERENCE",
            Self::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
            Self::ComplianceTimeout(_) => "COMPLIANCE_TIMEOUT",
            Self::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            Self::WalletNotFound(_) => "WALLET_NOT_FOUND",
            Self::InvoiceNotFound(_) => "INVOICE_NOT_FOUND",
            Self::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
        }
    }

    /// Returns true if the engine may retry this error internally.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict)
    }
}
