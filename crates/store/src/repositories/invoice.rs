//! Invoice repository with per-owner reference uniqueness.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;

use kasira_core::invoice::{Invoice, InvoiceStatus};
use kasira_shared::types::{CustomerId, InvoiceId, WalletId};
use kasira_shared::{EngineError, EngineResult};

/// In-memory invoice records with a per-owner reference index.
#[derive(Debug, Default)]
pub struct InvoiceRepository {
    invoices: DashMap<InvoiceId, Invoice>,
    by_reference: DashMap<(CustomerId, String), InvoiceId>,
}

impl InvoiceRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new invoice, claiming its reference for `owner`.
    ///
    /// # Errors
    ///
    /// `DuplicateInvoiceReference` when the owner already used the
    /// reference. The claim is atomic, so two concurrent inserts of the
    /// same reference cannot both succeed.
    pub fn insert(&self, owner: CustomerId, invoice: Invoice) -> EngineResult<()> {
        let key = (owner, invoice.reference.clone());
        match self.by_reference.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(
                EngineError::DuplicateInvoiceReference(invoice.reference.clone()),
            ),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(invoice.id);
                self.invoices.insert(invoice.id, invoice);
                Ok(())
            }
        }
    }

    /// Removes an invoice and frees its reference.
    ///
    /// Only used to roll back a failed transactional insert; committed
    /// invoices are never deleted.
    pub fn remove(&self, owner: CustomerId, invoice_id: InvoiceId) {
        if let Some((_, invoice)) = self.invoices.remove(&invoice_id) {
            self.by_reference.remove(&(owner, invoice.reference));
        }
    }

    /// Fetches an invoice snapshot.
    ///
    /// # Errors
    ///
    /// `InvoiceNotFound` for unknown ids.
    pub fn get(&self, id: InvoiceId) -> EngineResult<Invoice> {
        self.invoices
            .get(&id)
            .map(|i| i.clone())
            .ok_or(EngineError::InvoiceNotFound(id))
    }

    /// Commits a mutated invoice snapshot.
    ///
    /// Invoices are only ever mutated under their wallet's lock, so a
    /// plain overwrite is safe here.
    ///
    /// # Errors
    ///
    /// `InvoiceNotFound` for unknown ids.
    pub fn update(&self, invoice: Invoice) -> EngineResult<()> {
        let mut stored = self
            .invoices
            .get_mut(&invoice.id)
            .ok_or(EngineError::InvoiceNotFound(invoice.id))?;
        *stored = invoice;
        Ok(())
    }

    /// Looks up an owner's invoice by reference.
    #[must_use]
    pub fn find_by_reference(&self, owner: CustomerId, reference: &str) -> Option<Invoice> {
        let id = self
            .by_reference
            .get(&(owner, reference.to_string()))
            .map(|entry| *entry)?;
        self.invoices.get(&id).map(|i| i.clone())
    }

    /// Counts the wallet's invoices that still hold a reservation.
    #[must_use]
    pub fn open_invoice_count(&self, wallet_id: WalletId) -> usize {
        self.invoices
            .iter()
            .filter(|i| i.wallet_id == wallet_id && i.holds_reservation())
            .count()
    }

    /// Cumulative invoice volume attached to the wallet since `since`.
    ///
    /// Counts every invoice the rule chain admitted (pending, partially
    /// paid, paid); blocked and cancelled invoices never consumed volume.
    #[must_use]
    pub fn rolling_volume(&self, wallet_id: WalletId, since: DateTime<Utc>) -> Decimal {
        self.invoices
            .iter()
            .filter(|i| {
                i.wallet_id == wallet_id
                    && i.created_at >= since
                    && !matches!(i.status, InvoiceStatus::Blocked | InvoiceStatus::Cancelled)
            })
            .map(|i| i.amount)
            .sum()
    }
}
