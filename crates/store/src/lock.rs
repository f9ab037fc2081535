//! Per-wallet exclusive locking.
//!
//! Every balance-mutating operation takes its wallet's lock before
//! reading balances and evaluating limits, and releases it after the
//! ledger entry is appended. Operations on different wallets proceed in
//! parallel. This is a capability type: a multi-node deployment can
//! swap the in-process mutex table for a distributed lease without
//! touching the engine logic.

use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;

use kasira_shared::types::WalletId;

/// In-process per-wallet mutex table.
#[derive(Debug, Default)]
pub struct WalletLockManager {
    locks: DashMap<WalletId, Arc<Mutex<()>>>,
}

impl WalletLockManager {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, wallet_id: WalletId) -> Arc<Mutex<()>> {
        self.locks
            .entry(wallet_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Runs `f` while holding the exclusive lock for `wallet_id`.
    pub fn with_lock<T>(&self, wallet_id: WalletId, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(wallet_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Runs `f` while holding both wallets' locks.
    ///
    /// Locks are always acquired in ascending wallet-id order, so two
    /// concurrent transfers between the same pair cannot deadlock.
    pub fn with_pair_lock<T>(
        &self,
        first: WalletId,
        second: WalletId,
        f: impl FnOnce() -> T,
    ) -> T {
        debug_assert_ne!(first, second, "pair lock requires distinct wallets");
        let (low, high) = if first < second {
            (first, second)
        } else {
            (second, first)
        };
        let low_lock = self.lock_for(low);
        let high_lock = self.lock_for(high);
        let _low_guard = low_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let _high_guard = high_lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }
}
