//! In-memory repositories over the engine's durable records.
//!
//! Repositories hide the storage representation from the service layer;
//! a database-backed deployment swaps these out behind the same
//! signatures.

pub mod idempotency;
pub mod invoice;
pub mod ledger;
pub mod rule;
pub mod wallet;

pub use idempotency::IdempotencyStore;
pub use invoice::InvoiceRepository;
pub use ledger::LedgerStore;
pub use rule::RuleRepository;
pub use wallet::WalletRepository;
