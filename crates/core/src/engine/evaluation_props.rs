//! Property-based tests for the rule evaluation engine.

use proptest::prelude::*;
use rust_decimal::Decimal;

use chrono::{NaiveDate, Utc};
use kasira_shared::types::{Currency, CustomerId, RuleId};

use crate::compliance::{CheckName, CheckOutcome, ComplianceVerificationService, VerificationError};
use crate::customer::Customer;
use crate::engine::evaluation::{EvaluationInput, RuleEvaluationEngine};
use crate::invoice::{Invoice, InvoiceDraft};
use crate::limits::WindowUsage;
use crate::rules::{BusinessRule, RuleAction, RuleCondition, RuleKind};
use crate::wallet::{Wallet, WalletLimits, WalletMode};

/// Verifier that passes every check; properties here exercise the rule
/// chain, not the verification seam.
struct AlwaysPasses;

impl ComplianceVerificationService for AlwaysPasses {
    fn check(
        &self,
        _customer: CustomerId,
        _check: CheckName,
    ) -> Result<CheckOutcome, VerificationError> {
        Ok(CheckOutcome::pass())
    }
}

fn fixture(amount: Decimal) -> (Invoice, Wallet, Customer) {
    let customer = Customer {
        id: CustomerId::new(),
        display_name: "prop".to_string(),
        kyc_verified_up_to: Some(Decimal::MAX),
        risk_flagged: false,
    };
    let wallet = Wallet::new(
        customer.id,
        WalletMode::Persistent,
        Currency::Usd,
        WalletLimits::unlimited(),
        None,
        Utc::now(),
    );
    let invoice = Invoice::from_draft(
        InvoiceDraft {
            reference: "INV-prop".to_string(),
            amount,
            currency: Currency::Usd,
            customer: customer.id,
            line_items: vec![],
            due_date: NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
        },
        wallet.id,
        Utc::now(),
    );
    (invoice, wallet, customer)
}

/// Strategy for a random custom rule.
fn arb_rule() -> impl Strategy<Value = BusinessRule> {
    (
        -5i16..5i16,
        any::<bool>(),
        prop_oneof![
            Just(RuleAction::Allow),
            "[a-z]{4,12}".prop_map(|reason| RuleAction::Block { reason }),
            prop_oneof![
                Just(CheckName::Kyc),
                Just(CheckName::Aml),
                Just(CheckName::Sanctions),
            ]
            .prop_map(|check| RuleAction::RequireAdditionalCheck { check }),
        ],
    )
        .prop_map(|(priority, active, action)| BusinessRule {
            id: RuleId::new(),
            name: format!("prop rule p{priority}"),
            kind: RuleKind::Custom,
            priority,
            active,
            condition: RuleCondition::default(),
            action,
            check_order: None,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The engine is deterministic: identical inputs, identical verdicts.
    #[test]
    fn prop_evaluation_is_deterministic(
        amount in 1i64..1_000_000i64,
        rules in proptest::collection::vec(arb_rule(), 0..8),
    ) {
        let (invoice, wallet, customer) = fixture(Decimal::from(amount));
        let engine = RuleEvaluationEngine::new(Decimal::from(100_000));
        let input = EvaluationInput {
            wallet: &wallet,
            invoice: &invoice,
            customer: &customer,
            rules: &rules,
            window_usage: WindowUsage::default(),
            rolling_volume_30d: invoice.amount,
        };

        let first = engine.evaluate(&input, &AlwaysPasses).unwrap();
        let second = engine.evaluate(&input, &AlwaysPasses).unwrap();
        prop_assert_eq!(first.verdict, second.verdict);
    }

    /// When any active blocking rule matches, the verdict is exactly the
    /// reason of the first one in (priority, id) order.
    #[test]
    fn prop_first_blocking_rule_wins(
        amount in 1i64..1_000_000i64,
        rules in proptest::collection::vec(arb_rule(), 1..8),
    ) {
        let (invoice, wallet, customer) = fixture(Decimal::from(amount));
        let engine = RuleEvaluationEngine::new(Decimal::from(100_000));
        let input = EvaluationInput {
            wallet: &wallet,
            invoice: &invoice,
            customer: &customer,
            rules: &rules,
            window_usage: WindowUsage::default(),
            rolling_volume_30d: invoice.amount,
        };

        let outcome = engine.evaluate(&input, &AlwaysPasses).unwrap();

        let mut active: Vec<&BusinessRule> = rules.iter().filter(|r| r.active).collect();
        active.sort_by_key(|r| (r.priority, r.id));
        let expected_block = active.iter().find_map(|r| match &r.action {
            RuleAction::Block { reason } => Some(reason.clone()),
            _ => None,
        });

        match expected_block {
            Some(reason) => prop_assert_eq!(
                outcome.verdict.block_reason().map(str::to_string),
                Some(reason)
            ),
            None => prop_assert!(outcome.verdict.block_reason().is_none()),
        }
    }

    /// Mode selection never rejects: for a clean invoice the verdict is
    /// independent of the rolling volume, converted or not.
    #[test]
    fn prop_mode_selection_never_blocks(
        amount in 1i64..1_000_000i64,
        volume in 0i64..10_000_000i64,
        threshold in 1i64..10_000_000i64,
    ) {
        let (invoice, mut wallet, customer) = fixture(Decimal::from(amount));
        wallet.mode = WalletMode::Adaptive;
        wallet.adaptive_threshold = Some(Decimal::from(threshold));

        let engine = RuleEvaluationEngine::new(Decimal::from(100_000));
        let input = EvaluationInput {
            wallet: &wallet,
            invoice: &invoice,
            customer: &customer,
            rules: &[],
            window_usage: WindowUsage::default(),
            rolling_volume_30d: Decimal::from(volume),
        };

        let outcome = engine.evaluate(&input, &AlwaysPasses).unwrap();
        prop_assert!(outcome.verdict.is_accept());
        prop_assert_eq!(outcome.mode.converted, volume >= threshold);
    }
}
