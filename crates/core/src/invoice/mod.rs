//! Invoice domain types and validation.
//!
//! Invoices are created when attached to a wallet and mutated only
//! through the rule evaluation engine and the balance state machine.

pub mod types;
pub mod validation;

pub use types::{Invoice, InvoiceDraft, InvoiceStatus, LineItem};
pub use validation::validate_draft;
