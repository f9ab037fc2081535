//! Invoice records and lifecycle.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kasira_shared::types::{Currency, CustomerId, InvoiceId, WalletId};
use kasira_shared::{EngineError, EngineResult};

/// Invoice lifecycle status. `Paid` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Awaiting payment; a reservation may be outstanding.
    Pending,
    /// Rejected by the rule chain; no funds are held.
    Blocked,
    /// Some captures applied, remainder still reserved.
    PartiallyPaid,
    /// Terminal: fully captured.
    Paid,
    /// Terminal: reservation released, invoice abandoned.
    Cancelled,
}

impl InvoiceStatus {
    /// Returns true once no further state transitions are possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled)
    }

    /// Stable name used in serialized records and responses.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Blocked => "blocked",
            Self::PartiallyPaid => "partially_paid",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One line of an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// What is being billed.
    pub description: String,
    /// Billed quantity.
    pub quantity: u32,
    /// Price per unit in minor currency units.
    pub unit_price: Decimal,
}

impl LineItem {
    /// Extended amount of this line.
    #[must_use]
    pub fn extended(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price
    }
}

/// Caller-submitted invoice fields, before the engine accepts them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceDraft {
    /// Reference number, unique per wallet owner.
    pub reference: String,
    /// Total amount in minor currency units.
    pub amount: Decimal,
    /// Invoice currency; must match the wallet.
    pub currency: Currency,
    /// The billed customer.
    pub customer: CustomerId,
    /// Ordered line items; may be empty for a bare amount.
    pub line_items: Vec<LineItem>,
    /// Payment due date.
    pub due_date: NaiveDate,
}

/// An invoice attached to a wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// The invoice ID.
    pub id: InvoiceId,
    /// Reference number, unique per wallet owner.
    pub reference: String,
    /// Total amount in minor currency units.
    pub amount: Decimal,
    /// Invoice currency.
    pub currency: Currency,
    /// The billed customer.
    pub customer: CustomerId,
    /// Ordered line items.
    pub line_items: Vec<LineItem>,
    /// Payment due date.
    pub due_date: NaiveDate,
    /// Lifecycle status.
    pub status: InvoiceStatus,
    /// Amount captured so far; never exceeds `amount`.
    pub amount_paid: Decimal,
    /// The wallet this invoice draws on.
    pub wallet_id: WalletId,
    /// When the invoice was attached to the wallet.
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    /// Builds the invoice record for a validated draft.
    #[must_use]
    pub fn from_draft(draft: InvoiceDraft, wallet_id: WalletId, now: DateTime<Utc>) -> Self {
        Self {
            id: InvoiceId::new(),
            reference: draft.reference,
            amount: draft.amount,
            currency: draft.currency,
            customer: draft.customer,
            line_items: draft.line_items,
            due_date: draft.due_date,
            status: InvoiceStatus::Pending,
            amount_paid: Decimal::ZERO,
            wallet_id,
            created_at: now,
        }
    }

    /// Amount still owed (and, while the invoice is open, still reserved).
    #[must_use]
    pub fn remaining(&self) -> Decimal {
        self.amount - self.amount_paid
    }

    /// Returns true while the invoice holds an outstanding reservation.
    #[must_use]
    pub fn holds_reservation(&self) -> bool {
        matches!(self.status, InvoiceStatus::Pending | InvoiceStatus::PartiallyPaid)
    }

    /// Records a capture of `amount` against this invoice.
    ///
    /// # Errors
    ///
    /// `Validation` if the invoice holds no reservation or `amount`
    /// exceeds what is still owed.
    pub fn record_capture(&mut self, amount: Decimal) -> EngineResult<()> {
        if !self.holds_reservation() {
            return Err(EngineError::Validation(format!(
                "invoice {} is {} and cannot be captured",
                self.id, self.status
            )));
        }
        if amount > self.remaining() {
            return Err(EngineError::Validation(format!(
                "capture of {amount} exceeds remaining {} on invoice {}",
                self.remaining(),
                self.id
            )));
        }
        self.amount_paid += amount;
        self.status = if self.amount_paid == self.amount {
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::PartiallyPaid
        };
        Ok(())
    }

    /// Marks the invoice blocked by the rule chain.
    pub fn mark_blocked(&mut self) {
        self.status = InvoiceStatus::Blocked;
    }

    /// Reopens a blocked invoice for re-evaluation after remediation.
    ///
    /// # Errors
    ///
    /// `Validation` unless the invoice is currently blocked.
    pub fn reopen(&mut self) -> EngineResult<()> {
        if self.status != InvoiceStatus::Blocked {
            return Err(EngineError::Validation(format!(
                "invoice {} is {} and cannot be reopened",
                self.id, self.status
            )));
        }
        self.status = InvoiceStatus::Pending;
        Ok(())
    }

    /// Cancels the invoice after its reservation was released.
    ///
    /// # Errors
    ///
    /// `Validation` if the invoice is already terminal.
    pub fn mark_cancelled(&mut self) -> EngineResult<()> {
        if self.status.is_terminal() {
            return Err(EngineError::Validation(format!(
                "invoice {} is already {}",
                self.id, self.status
            )));
        }
        self.status = InvoiceStatus::Cancelled;
        Ok(())
    }
}
