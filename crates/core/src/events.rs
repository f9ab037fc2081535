//! Events emitted by the engine for downstream notification layers.
//!
//! The engine never blocks on a sink; emission happens after the owning
//! transaction has committed.

use rust_decimal::Decimal;
use serde::Serialize;

use kasira_shared::types::{InvoiceId, TransferId, WalletId};

use crate::wallet::WalletMode;

/// A domain event produced by a committed engine operation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A wallet was provisioned.
    WalletCreated {
        /// The new wallet.
        wallet_id: WalletId,
    },
    /// An Adaptive wallet converted to Persistent.
    WalletModeChanged {
        /// The converted wallet.
        wallet_id: WalletId,
        /// Mode before conversion.
        from: WalletMode,
        /// Mode after conversion.
        to: WalletMode,
    },
    /// An invoice was blocked by the rule chain.
    InvoiceBlocked {
        /// The blocked invoice.
        invoice_id: InvoiceId,
        /// The wallet it was evaluated against.
        wallet_id: WalletId,
        /// The failing rule's reason.
        reason: String,
    },
    /// An invoice reached full payment.
    InvoicePaid {
        /// The paid invoice.
        invoice_id: InvoiceId,
        /// The paying wallet.
        wallet_id: WalletId,
        /// Total amount paid.
        amount: Decimal,
    },
    /// An invoice was partially paid.
    InvoicePartiallyPaid {
        /// The invoice.
        invoice_id: InvoiceId,
        /// The paying wallet.
        wallet_id: WalletId,
        /// Cumulative amount paid so far.
        amount_paid: Decimal,
        /// Amount still owed.
        remaining: Decimal,
    },
    /// Funds moved between two wallets.
    FundsTransferred {
        /// Correlation ID shared by both ledger legs.
        transfer_id: TransferId,
        /// Source wallet.
        source: WalletId,
        /// Target wallet.
        target: WalletId,
        /// Transferred amount.
        amount: Decimal,
    },
    /// Funds were deposited into a wallet.
    FundsDeposited {
        /// The funded wallet.
        wallet_id: WalletId,
        /// Deposited amount.
        amount: Decimal,
    },
}

impl EngineEvent {
    /// Stable event name used by downstream consumers.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::WalletCreated { .. } => "wallet_created",
            Self::WalletModeChanged { .. } => "wallet_mode_changed",
            Self::InvoiceBlocked { .. } => "invoice_blocked",
            Self::InvoicePaid { .. } => "invoice_paid",
            Self::InvoicePartiallyPaid { .. } => "invoice_partially_paid",
            Self::FundsTransferred { .. } => "funds_transferred",
            Self::FundsDeposited { .. } => "funds_deposited",
        }
    }
}

/// Sink for engine events.
pub trait EventSink: Send + Sync {
    /// Delivers one event. Implementations must not panic.
    fn emit(&self, event: EngineEvent);
}

/// Sink that buffers events in memory.
///
/// Used by tests and by consumers that drain events on their own cadence.
#[derive(Debug, Default)]
pub struct InMemoryEventSink {
    events: std::sync::Mutex<Vec<EngineEvent>>,
}

impl InMemoryEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of everything emitted so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<EngineEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of events with the given stable name.
    #[must_use]
    pub fn count_of(&self, name: &str) -> usize {
        self.snapshot().iter().filter(|e| e.name() == name).count()
    }
}

impl EventSink for InMemoryEventSink {
    fn emit(&self, event: EngineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
