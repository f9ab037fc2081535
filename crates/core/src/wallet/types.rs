//! Wallet records, modes, statuses, and spending limits.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kasira_shared::types::{Currency, CustomerId, WalletId};
use kasira_shared::{EngineError, EngineResult};

use crate::ledger::WalletBalances;

/// How a wallet relates to the invoices drawn against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletMode {
    /// Single-use wallet scoped to one invoice.
    Ephemeral,
    /// Long-lived wallet reused across many invoices.
    Persistent,
    /// Starts ephemeral-like, auto-converts to Persistent once
    /// cumulative 30-day volume crosses the wallet's threshold.
    Adaptive,
}

impl WalletMode {
    /// Stable name used in serialized records and events.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ephemeral => "ephemeral",
            Self::Persistent => "persistent",
            Self::Adaptive => "adaptive",
        }
    }
}

impl std::fmt::Display for WalletMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Administrative wallet status.
///
/// Transitions are admin-driven and monotonic: `Active → Restricted →
/// Frozen`. Reactivating a frozen wallet is outside this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletStatus {
    /// Wallet accepts all operations.
    Active,
    /// Wallet rejects mutating operations.
    Restricted,
    /// Terminal: wallet rejects mutating operations.
    Frozen,
}

impl WalletStatus {
    /// Returns true if the wallet accepts mutating operations.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Stable name used in error messages and serialized records.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Restricted => "restricted",
            Self::Frozen => "frozen",
        }
    }
}

impl std::fmt::Display for WalletStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Spending caps for a wallet, in minor units. `None` means no cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletLimits {
    /// Cap on a single invoice or payment.
    pub per_transaction_max: Option<Decimal>,
    /// Cap on reserve volume within the current UTC day.
    pub daily_max: Option<Decimal>,
    /// Cap on reserve volume within the current calendar month (UTC).
    pub monthly_max: Option<Decimal>,
}

impl WalletLimits {
    /// Limits with no caps at all.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            per_transaction_max: None,
            daily_max: None,
            monthly_max: None,
        }
    }
}

/// A wallet record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    /// The wallet ID.
    pub id: WalletId,
    /// The owning customer account.
    pub owner: CustomerId,
    /// Governing mode.
    pub mode: WalletMode,
    /// Wallet currency; invoices must match it.
    pub currency: Currency,
    /// Materialized balance view.
    pub balances: WalletBalances,
    /// Spending caps.
    pub limits: WalletLimits,
    /// Administrative status.
    pub status: WalletStatus,
    /// Conversion threshold; meaningful only while `mode` is Adaptive.
    pub adaptive_threshold: Option<Decimal>,
    /// Optimistic-concurrency version, bumped on every committed mutation.
    pub version: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    /// Creates a fresh wallet with zero balances.
    #[must_use]
    pub fn new(
        owner: CustomerId,
        mode: WalletMode,
        currency: Currency,
        limits: WalletLimits,
        adaptive_threshold: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: WalletId::new(),
            owner,
            mode,
            currency,
            balances: WalletBalances::zero(),
            limits,
            status: WalletStatus::Active,
            adaptive_threshold,
            version: 0,
            created_at: now,
        }
    }

    /// Fails with `WalletInactive` unless the wallet is active.
    pub fn ensure_active(&self) -> EngineResult<()> {
        if self.status.is_active() {
            Ok(())
        } else {
            Err(EngineError::WalletInactive {
                wallet_id: self.id,
                status: self.status.as_str().to_string(),
            })
        }
    }

    /// Fails with `CurrencyMismatch` unless `currency` matches the wallet.
    pub fn ensure_currency(&self, currency: Currency) -> EngineResult<()> {
        if self.currency == currency {
            Ok(())
        } else {
            Err(EngineError::CurrencyMismatch {
                expected: self.currency,
                actual: currency,
            })
        }
    }
}
