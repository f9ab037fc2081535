//! Per-transaction, daily, and monthly cap checks.
//!
//! The enforcer is pure: window usage is read from the ledger by the
//! caller while holding the wallet lock, so no two checks on the same
//! wallet can observe a stale ledger simultaneously.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::wallet::Wallet;

/// Which cap a payment attempt violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LimitViolation {
    /// Single payment above `per_transaction_max`.
    PerTxExceeded,
    /// Current UTC day volume above `daily_max`.
    DailyExceeded,
    /// Current calendar month volume above `monthly_max`.
    MonthlyExceeded,
}

impl LimitViolation {
    /// Stable name surfaced in block reasons (`limit:DAILY_EXCEEDED`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PerTxExceeded => "PER_TX_EXCEEDED",
            Self::DailyExceeded => "DAILY_EXCEEDED",
            Self::MonthlyExceeded => "MONTHLY_EXCEEDED",
        }
    }
}

impl std::fmt::Display for LimitViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Captured + reserved volume already committed in the current windows,
/// read from the ledger at evaluation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowUsage {
    /// Volume within the current UTC day.
    pub day: Decimal,
    /// Volume within the current calendar month (UTC).
    pub month: Decimal,
}

/// Stateless limit enforcer.
pub struct LimitEnforcer;

impl LimitEnforcer {
    /// Checks one payment amount against the wallet's caps.
    ///
    /// # Errors
    ///
    /// The first violated cap, checked per-transaction → daily → monthly.
    pub fn check(
        wallet: &Wallet,
        amount: Decimal,
        usage: &WindowUsage,
    ) -> Result<(), LimitViolation> {
        if wallet
            .limits
            .per_transaction_max
            .is_some_and(|max| amount > max)
        {
            return Err(LimitViolation::PerTxExceeded);
        }
        if wallet
            .limits
            .daily_max
            .is_some_and(|max| usage.day + amount > max)
        {
            return Err(LimitViolation::DailyExceeded);
        }
        if wallet
            .limits
            .monthly_max
            .is_some_and(|max| usage.month + amount > max)
        {
            return Err(LimitViolation::MonthlyExceeded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::{WalletLimits, WalletMode};
    use chrono::Utc;
    use kasira_shared::types::{Currency, CustomerId};
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn wallet(limits: WalletLimits) -> Wallet {
        Wallet::new(
            CustomerId::new(),
            WalletMode::Persistent,
            Currency::Usd,
            limits,
            None,
            Utc::now(),
        )
    }

    #[test]
    fn test_unlimited_wallet_accepts_anything() {
        let w = wallet(WalletLimits::unlimited());
        let usage = WindowUsage {
            day: dec!(1_000_000),
            month: dec!(9_000_000),
        };
        assert!(LimitEnforcer::check(&w, dec!(1_000_000_000), &usage).is_ok());
    }

    #[test]
    fn test_per_transaction_cap() {
        let w = wallet(WalletLimits {
            per_transaction_max: Some(dec!(500)),
            ..WalletLimits::unlimited()
        });
        assert!(LimitEnforcer::check(&w, dec!(500), &WindowUsage::default()).is_ok());
        assert_eq!(
            LimitEnforcer::check(&w, dec!(501), &WindowUsage::default()),
            Err(LimitViolation::PerTxExceeded)
        );
    }

    /// dailyMax 1000 with 700 already captured today: 400 is rejected,
    /// 300 is accepted.
    #[rstest]
    #[case(dec!(400), Err(LimitViolation::DailyExceeded))]
    #[case(dec!(300), Ok(()))]
    fn test_daily_cap_boundary(
        #[case] amount: Decimal,
        #[case] expected: Result<(), LimitViolation>,
    ) {
        let w = wallet(WalletLimits {
            daily_max: Some(dec!(1000)),
            ..WalletLimits::unlimited()
        });
        let usage = WindowUsage {
            day: dec!(700),
            month: dec!(700),
        };
        assert_eq!(LimitEnforcer::check(&w, amount, &usage), expected);
    }

    #[test]
    fn test_monthly_cap() {
        let w = wallet(WalletLimits {
            monthly_max: Some(dec!(10_000)),
            ..WalletLimits::unlimited()
        });
        let usage = WindowUsage {
            day: dec!(0),
            month: dec!(9_900),
        };
        assert_eq!(
            LimitEnforcer::check(&w, dec!(101), &usage),
            Err(LimitViolation::MonthlyExceeded)
        );
        assert!(LimitEnforcer::check(&w, dec!(100), &usage).is_ok());
    }

    #[test]
    fn test_per_transaction_reported_before_daily() {
        let w = wallet(WalletLimits {
            per_transaction_max: Some(dec!(100)),
            daily_max: Some(dec!(100)),
            monthly_max: None,
        });
        let usage = WindowUsage {
            day: dec!(100),
            month: dec!(100),
        };
        assert_eq!(
            LimitEnforcer::check(&w, dec!(200), &usage),
            Err(LimitViolation::PerTxExceeded)
        );
    }
}
