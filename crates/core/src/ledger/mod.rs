//! Append-only wallet ledger.
//!
//! This module implements the ledger layer of the engine:
//! - Ledger entries (the only durable record of balance movement)
//! - Balance buckets and their transition rules
//! - Replay of the entry log into a materialized balance view
//!
//! Entries are never mutated after creation; corrections are new
//! compensating entries.

pub mod balance;
pub mod entry;

#[cfg(test)]
mod balance_props;

pub use balance::{WalletBalances, ledger_sum};
pub use entry::{EntryKind, LedgerEntry};
