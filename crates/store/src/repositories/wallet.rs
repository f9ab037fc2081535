//! Wallet repository with optimistic-concurrency updates.

use dashmap::DashMap;

use kasira_core::wallet::{Wallet, WalletStatus};
use kasira_shared::types::WalletId;
use kasira_shared::{EngineError, EngineResult};

/// In-memory wallet records keyed by id.
#[derive(Debug, Default)]
pub struct WalletRepository {
    wallets: DashMap<WalletId, Wallet>,
}

impl WalletRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a freshly provisioned wallet.
    pub fn insert(&self, wallet: Wallet) {
        self.wallets.insert(wallet.id, wallet);
    }

    /// Fetches a wallet snapshot.
    ///
    /// # Errors
    ///
    /// `WalletNotFound` for unknown ids.
    pub fn get(&self, id: WalletId) -> EngineResult<Wallet> {
        self.wallets
            .get(&id)
            .map(|w| w.clone())
            .ok_or(EngineError::WalletNotFound(id))
    }

    /// Commits a mutated wallet snapshot.
    ///
    /// The stored record must still carry the version the snapshot was
    /// read at; the committed record gets `version + 1`. Returns the
    /// committed wallet.
    ///
    /// # Errors
    ///
    /// `ConcurrencyConflict` when the stored version moved on,
    /// `WalletNotFound` for unknown ids.
    pub fn update_versioned(&self, mut wallet: Wallet) -> EngineResult<Wallet> {
        let mut stored = self
            .wallets
            .get_mut(&wallet.id)
            .ok_or(EngineError::WalletNotFound(wallet.id))?;
        if stored.version != wallet.version {
            return Err(EngineError::ConcurrencyConflict);
        }
        wallet.version += 1;
        *stored = wallet.clone();
        Ok(wallet)
    }

    /// Applies an administrator status change.
    ///
    /// Transitions are monotonic: `Active → Restricted → Frozen`. Moving
    /// backwards is rejected; reactivation lives outside this engine.
    ///
    /// # Errors
    ///
    /// `Validation` for a non-monotonic transition, `WalletNotFound` for
    /// unknown ids.
    pub fn set_status(&self, id: WalletId, status: WalletStatus) -> EngineResult<Wallet> {
        let mut stored = self
            .wallets
            .get_mut(&id)
            .ok_or(EngineError::WalletNotFound(id))?;

        let rank = |s: WalletStatus| match s {
            WalletStatus::Active => 0,
            WalletStatus::Restricted => 1,
            WalletStatus::Frozen => 2,
        };
        if rank(status) < rank(stored.status) {
            return Err(EngineError::Validation(format!(
                "wallet status cannot move from {} back to {}",
                stored.status, status
            )));
        }

        stored.status = status;
        stored.version += 1;
        Ok(stored.clone())
    }
}
