//! Wallet mode selection.
//!
//! Mode selection runs first in the rule chain and never rejects an
//! invoice; it only decides which mode governs the pairing and whether
//! an Adaptive wallet converts. The caller commits a conversion in the
//! same transaction as the ledger mutation that triggered it, so no
//! half-converted wallet is ever observable.

use rust_decimal::Decimal;
use serde::Serialize;

use super::types::{Wallet, WalletMode};

/// Outcome of mode selection for one wallet-invoice pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModeDecision {
    /// The mode governing this invoice.
    pub mode: WalletMode,
    /// True when an Adaptive wallet crossed its threshold and must be
    /// persisted as Persistent together with the ledger mutation.
    pub converted: bool,
}

/// Stateless mode selector.
pub struct ModeSelector;

impl ModeSelector {
    /// Decides the governing mode for a wallet-invoice pairing.
    ///
    /// `rolling_volume_30d` is the wallet's cumulative invoice volume
    /// over the trailing 30 days, *including* the invoice under
    /// evaluation.
    ///
    /// - Ephemeral and Persistent wallets keep their mode; Persistent
    ///   never converts.
    /// - An Adaptive wallet converts to Persistent once the rolling
    ///   volume reaches its threshold; otherwise it stays Adaptive.
    #[must_use]
    pub fn select(wallet: &Wallet, rolling_volume_30d: Decimal) -> ModeDecision {
        match wallet.mode {
            WalletMode::Ephemeral | WalletMode::Persistent => ModeDecision {
                mode: wallet.mode,
                converted: false,
            },
            WalletMode::Adaptive => {
                let crossed = wallet
                    .adaptive_threshold
                    .is_some_and(|threshold| rolling_volume_30d >= threshold);
                if crossed {
                    ModeDecision {
                        mode: WalletMode::Persistent,
                        converted: true,
                    }
                } else {
                    ModeDecision {
                        mode: WalletMode::Adaptive,
                        converted: false,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::types::{WalletLimits, WalletStatus};
    use chrono::Utc;
    use kasira_shared::types::{Currency, CustomerId};
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn wallet(mode: WalletMode, adaptive_threshold: Option<Decimal>) -> Wallet {
        let mut w = Wallet::new(
            CustomerId::new(),
            mode,
            Currency::Usd,
            WalletLimits::unlimited(),
            adaptive_threshold,
            Utc::now(),
        );
        w.status = WalletStatus::Active;
        w
    }

    #[rstest]
    #[case(WalletMode::Ephemeral)]
    #[case(WalletMode::Persistent)]
    fn test_non_adaptive_modes_never_convert(#[case] mode: WalletMode) {
        let decision = ModeSelector::select(&wallet(mode, None), dec!(1_000_000_000));
        assert_eq!(decision.mode, mode);
        assert!(!decision.converted);
    }

    #[test]
    fn test_adaptive_below_threshold_stays_adaptive() {
        let decision = ModeSelector::select(
            &wallet(WalletMode::Adaptive, Some(dec!(5000))),
            dec!(4900),
        );
        assert_eq!(decision.mode, WalletMode::Adaptive);
        assert!(!decision.converted);
    }

    #[test]
    fn test_adaptive_crossing_threshold_converts() {
        let decision = ModeSelector::select(
            &wallet(WalletMode::Adaptive, Some(dec!(5000))),
            dec!(5100),
        );
        assert_eq!(decision.mode, WalletMode::Persistent);
        assert!(decision.converted);
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let decision = ModeSelector::select(
            &wallet(WalletMode::Adaptive, Some(dec!(5000))),
            dec!(5000),
        );
        assert!(decision.converted);
    }

    #[test]
    fn test_adaptive_without_threshold_never_converts() {
        let decision = ModeSelector::select(&wallet(WalletMode::Adaptive, None), dec!(999_999));
        assert_eq!(decision.mode, WalletMode::Adaptive);
        assert!(!decision.converted);
    }
}
