//! Ledger entry types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kasira_shared::types::{IdempotencyKey, InvoiceId, LedgerEntryId, TransferId, WalletId};

use super::balance::WalletBalances;

/// The kind of balance movement a ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Hold funds against an invoice: available → reserved.
    Reserve,
    /// Finalize (part of) a reservation: funds leave the wallet.
    Capture,
    /// Return a reservation: reserved → available.
    Release,
    /// Outgoing leg of a wallet-to-wallet transfer.
    TransferOut,
    /// Incoming leg of a wallet-to-wallet transfer.
    TransferIn,
    /// External funds entering the wallet.
    Deposit,
    /// External funds leaving the wallet.
    Withdrawal,
}

impl EntryKind {
    /// Stable name used in serialized records and log lines.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reserve => "reserve",
            Self::Capture => "capture",
            Self::Release => "release",
            Self::TransferOut => "transfer_out",
            Self::TransferIn => "transfer_in",
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
        }
    }

    /// Signed effect of this entry on the wallet's total balance.
    ///
    /// Reserve and Release move funds between buckets without changing
    /// the total; the rest add or remove funds.
    #[must_use]
    pub fn signed_effect(&self, amount: Decimal) -> Decimal {
        match self {
            Self::Reserve | Self::Release => Decimal::ZERO,
            Self::TransferIn | Self::Deposit => amount,
            Self::Capture | Self::TransferOut | Self::Withdrawal => -amount,
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable record in a wallet's ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Entry ID (UUID v7, so entry order follows creation order).
    pub id: LedgerEntryId,
    /// The wallet this entry belongs to.
    pub wallet_id: WalletId,
    /// Kind of balance movement.
    pub kind: EntryKind,
    /// Moved amount, always positive; direction is given by `kind`.
    pub amount: Decimal,
    /// Balance snapshot before this entry was applied.
    pub balance_before: WalletBalances,
    /// Balance snapshot after this entry was applied.
    pub balance_after: WalletBalances,
    /// Invoice this entry settles against, if any.
    pub invoice_id: Option<InvoiceId>,
    /// Correlation ID linking the two legs of a transfer.
    pub correlation_id: Option<TransferId>,
    /// When the entry was appended.
    pub timestamp: DateTime<Utc>,
    /// Key of the mutating call that produced this entry.
    pub idempotency_key: IdempotencyKey,
}
