//! Wallet balance buckets and transition rules.
//!
//! Balances are a materialized view over the append-only entry log: they
//! can always be rebuilt by replaying a wallet's entries from zero, and
//! the audit tooling does exactly that.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kasira_shared::{EngineError, EngineResult};

use super::entry::EntryKind;

/// The three balance buckets of a wallet, in minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalances {
    /// Funds free to be reserved, withdrawn, or transferred.
    pub available: Decimal,
    /// Funds staged by external settlement, not yet available.
    pub pending: Decimal,
    /// Funds held against invoices awaiting capture or release.
    pub reserved: Decimal,
}

impl WalletBalances {
    /// All buckets at zero.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            available: Decimal::ZERO,
            pending: Decimal::ZERO,
            reserved: Decimal::ZERO,
        }
    }

    /// Sum of all buckets. Equals the signed sum of the wallet's
    /// ledger entries at every point in time.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.available + self.pending + self.reserved
    }

    /// Applies one ledger entry kind to these balances, returning the
    /// resulting balances.
    ///
    /// # Errors
    ///
    /// - `InsufficientBalance` when `available` cannot cover a reserve,
    ///   withdrawal, or outgoing transfer.
    /// - `Validation` when `reserved` cannot cover a capture or release;
    ///   the caller enforces per-invoice reservation bounds before this.
    pub fn apply(&self, kind: EntryKind, amount: Decimal) -> EngineResult<Self> {
        let mut next = *self;
        match kind {
            EntryKind::Reserve => {
                Self::take(&mut next.available, amount)?;
                next.reserved += amount;
            }
            EntryKind::Capture => {
                Self::take_reserved(&mut next.reserved, amount)?;
            }
            EntryKind::Release => {
                Self::take_reserved(&mut next.reserved, amount)?;
                next.available += amount;
            }
            EntryKind::TransferOut | EntryKind::Withdrawal => {
                Self::take(&mut next.available, amount)?;
            }
            EntryKind::TransferIn | EntryKind::Deposit => {
                next.available += amount;
            }
        }
        Ok(next)
    }

    /// Rebuilds balances by replaying `(kind, amount)` pairs from zero.
    pub fn replay<I>(entries: I) -> EngineResult<Self>
    where
        I: IntoIterator<Item = (EntryKind, Decimal)>,
    {
        let mut balances = Self::zero();
        for (kind, amount) in entries {
            balances = balances.apply(kind, amount)?;
        }
        Ok(balances)
    }

    fn take(bucket: &mut Decimal, amount: Decimal) -> EngineResult<()> {
        if *bucket < amount {
            return Err(EngineError::InsufficientBalance {
                requested: amount,
                available: *bucket,
            });
        }
        *bucket -= amount;
        Ok(())
    }

    fn take_reserved(reserved: &mut Decimal, amount: Decimal) -> EngineResult<()> {
        if *reserved < amount {
            return Err(EngineError::Validation(format!(
                "amount {amount} exceeds reserved balance {reserved}"
            )));
        }
        *reserved -= amount;
        Ok(())
    }
}

impl Default for WalletBalances {
    fn default() -> Self {
        Self::zero()
    }
}

/// Signed sum of a sequence of `(kind, amount)` ledger effects.
///
/// Used by the audit invariant: for every wallet this sum equals
/// `available + pending + reserved`.
#[must_use]
pub fn ledger_sum<I>(entries: I) -> Decimal
where
    I: IntoIterator<Item = (EntryKind, Decimal)>,
{
    entries
        .into_iter()
        .map(|(kind, amount)| kind.signed_effect(amount))
        .sum()
}
