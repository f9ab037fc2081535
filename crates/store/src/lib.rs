//! Persistence and orchestration layer for Kasira.
//!
//! This crate provides:
//! - In-memory repositories over the domain records (wallets, invoices,
//!   business rules, the append-only ledger log, idempotency records)
//! - The per-wallet lock manager serializing balance mutations
//! - [`EngineService`], the transactional entry point combining rule
//!   evaluation with ledger application
//! - In-memory implementations of the compliance verification and
//!   customer directory seams for tests and single-node deployments

pub mod compliance;
pub mod lock;
pub mod repositories;
pub mod service;


pub use compliance::{InMemoryCustomerDirectory, StaticComplianceService, StubResponse};
pub use lock::WalletLockManager;
pub use repositories::{
    IdempotencyStore, InvoiceRepository, LedgerStore, RuleRepository, WalletRepository,
};
pub use service::{
    ApplyOutcome, CreateWalletInput, DepositOutcome, EngineService, EvaluateAndApplyInput,
    ReleaseOutcome, TransferOutcome, WalletAudit, WithdrawOutcome,
};
