//! Property-based tests for balance transitions.
//!
//! These validate the two ledger invariants: the bucket sum always equals
//! the signed sum of applied entries, and no operation drives a bucket
//! negative.

use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::ledger::balance::{WalletBalances, ledger_sum};
use crate::ledger::entry::EntryKind;

/// Strategy for a random entry kind.
fn arb_kind() -> impl Strategy<Value = EntryKind> {
    prop_oneof![
        Just(EntryKind::Reserve),
        Just(EntryKind::Capture),
        Just(EntryKind::Release),
        Just(EntryKind::TransferOut),
        Just(EntryKind::TransferIn),
        Just(EntryKind::Deposit),
        Just(EntryKind::Withdrawal),
    ]
}

/// Strategy for a positive minor-unit amount.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..50_000i64).prop_map(Decimal::from)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// After any sequence of operations (applying the ones that succeed,
    /// discarding the ones that fail), the bucket sum equals the signed
    /// ledger sum of the applied operations.
    #[test]
    fn prop_bucket_sum_equals_signed_ledger_sum(
        ops in proptest::collection::vec((arb_kind(), arb_amount()), 0..60)
    ) {
        let mut balances = WalletBalances::zero();
        let mut applied = Vec::new();

        for (kind, amount) in ops {
            if let Ok(next) = balances.apply(kind, amount) {
                balances = next;
                applied.push((kind, amount));
            }
        }

        prop_assert_eq!(balances.total(), ledger_sum(applied.clone()));
        // A rejected operation must have left no trace: replay agrees.
        prop_assert_eq!(balances, WalletBalances::replay(applied).unwrap());
    }

    /// No sequence of operations can drive any bucket negative.
    #[test]
    fn prop_buckets_never_negative(
        ops in proptest::collection::vec((arb_kind(), arb_amount()), 0..60)
    ) {
        let mut balances = WalletBalances::zero();

        for (kind, amount) in ops {
            if let Ok(next) = balances.apply(kind, amount) {
                balances = next;
            }
            prop_assert!(balances.available >= Decimal::ZERO);
            prop_assert!(balances.pending >= Decimal::ZERO);
            prop_assert!(balances.reserved >= Decimal::ZERO);
        }
    }

    /// Reserve followed by full release is a no-op on the balances.
    #[test]
    fn prop_reserve_release_roundtrip(
        funded in 1i64..1_000_000i64,
        hold in 1i64..1_000_000i64,
    ) {
        let start = WalletBalances {
            available: Decimal::from(funded),
            pending: Decimal::ZERO,
            reserved: Decimal::ZERO,
        };
        let hold = Decimal::from(hold.min(funded));

        let roundtrip = start
            .apply(EntryKind::Reserve, hold)
            .unwrap()
            .apply(EntryKind::Release, hold)
            .unwrap();

        prop_assert_eq!(roundtrip, start);
    }
}
