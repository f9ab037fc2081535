//! Rule chain orchestration.
//!
//! Identical inputs (same wallet snapshot, invoice, customer, active
//! rule set, window usage) always produce the same verdict: there is no
//! randomness and no wall-clock branching here. The daily and monthly
//! window boundaries live in the caller's usage read, in UTC.

use rust_decimal::Decimal;

use kasira_shared::EngineResult;

use crate::compliance::{
    ComplianceCheckResult, ComplianceGate, ComplianceVerificationService,
};
use crate::customer::Customer;
use crate::invoice::Invoice;
use crate::limits::{LimitEnforcer, WindowUsage};
use crate::rules::{BusinessRule, RuleAction, RuleKind, active_in_order};
use crate::wallet::{ModeDecision, ModeSelector, Wallet};

use super::verdict::Verdict;

/// Point-in-time inputs for one evaluation.
///
/// The caller reads window usage and rolling volume from the ledger
/// while holding the wallet lock, so an evaluation never observes a
/// half-applied mutation.
#[derive(Debug)]
pub struct EvaluationInput<'a> {
    /// Wallet snapshot.
    pub wallet: &'a Wallet,
    /// The invoice under evaluation.
    pub invoice: &'a Invoice,
    /// The billed customer.
    pub customer: &'a Customer,
    /// Full rule table; the engine filters and orders it.
    pub rules: &'a [BusinessRule],
    /// Captured + reserved volume in the current UTC day and month.
    pub window_usage: WindowUsage,
    /// Cumulative 30-day invoice volume including this invoice.
    pub rolling_volume_30d: Decimal,
}

/// Everything one evaluation produced.
#[derive(Debug)]
pub struct EvaluationOutcome {
    /// The verdict the caller branches on.
    pub verdict: Verdict,
    /// Mode decision; `converted` wallets must be persisted with the
    /// ledger mutation.
    pub mode: ModeDecision,
    /// Audit record of every compliance check that ran.
    pub compliance: Vec<ComplianceCheckResult>,
}

/// The rule evaluation engine.
pub struct RuleEvaluationEngine {
    gate: ComplianceGate,
}

impl RuleEvaluationEngine {
    /// Creates an engine with the given KYC step-up threshold.
    #[must_use]
    pub fn new(kyc_required_threshold: Decimal) -> Self {
        Self {
            gate: ComplianceGate::new(kyc_required_threshold),
        }
    }

    /// Runs the full rule chain for one invoice.
    ///
    /// Order: mode selection (never blocks) → compliance gate → limit
    /// enforcer → custom rules by `(priority, id)`. The first blocking
    /// outcome wins; `RequireAdditionalCheck` actions accumulate.
    ///
    /// # Errors
    ///
    /// `ComplianceTimeout` from the gate; every other outcome is a
    /// [`Verdict`], not an error.
    pub fn evaluate(
        &self,
        input: &EvaluationInput<'_>,
        verifier: &dyn ComplianceVerificationService,
    ) -> EngineResult<EvaluationOutcome> {
        let ordered = active_in_order(input.rules);
        let mode = ModeSelector::select(input.wallet, input.rolling_volume_30d);

        let compliance = self.gate.evaluate(
            input.invoice,
            input.wallet,
            input.customer,
            &ordered,
            verifier,
        )?;
        if let Some(failed) = compliance.iter().find(|r| !r.is_passed()) {
            let reason = failed.reason.as_deref().unwrap_or("failed");
            return Ok(EvaluationOutcome {
                verdict: Verdict::Block {
                    reason: format!("compliance:{}:{reason}", failed.check),
                },
                mode,
                compliance,
            });
        }

        if let Err(violation) =
            LimitEnforcer::check(input.wallet, input.invoice.amount, &input.window_usage)
        {
            return Ok(EvaluationOutcome {
                verdict: Verdict::Block {
                    reason: format!("limit:{violation}"),
                },
                mode,
                compliance,
            });
        }

        let mut required_checks = Vec::new();
        for rule in ordered
            .iter()
            .filter(|r| matches!(r.kind, RuleKind::Custom | RuleKind::Threshold))
        {
            if !rule
                .condition
                .matches(input.invoice, input.wallet, input.customer)
            {
                continue;
            }
            match &rule.action {
                RuleAction::Allow => {}
                RuleAction::Block { reason } => {
                    return Ok(EvaluationOutcome {
                        verdict: Verdict::Block {
                            reason: reason.clone(),
                        },
                        mode,
                        compliance,
                    });
                }
                RuleAction::RequireAdditionalCheck { check } => {
                    if !required_checks.contains(check) {
                        required_checks.push(*check);
                    }
                }
            }
        }

        let verdict = if required_checks.is_empty() {
            Verdict::Accept
        } else {
            Verdict::RequiresAdditionalCheck {
                checks: required_checks,
            }
        };

        Ok(EvaluationOutcome {
            verdict,
            mode,
            compliance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::types::{CheckOutcome, MockComplianceVerificationService};
    use crate::compliance::CheckName;
    use crate::invoice::InvoiceDraft;
    use crate::rules::RuleCondition;
    use crate::wallet::{WalletLimits, WalletMode};
    use chrono::{NaiveDate, Utc};
    use kasira_shared::types::{Currency, CustomerId, RuleId};
    use rust_decimal_macros::dec;

    fn fixture(amount: Decimal, limits: WalletLimits) -> (Invoice, Wallet, Customer) {
        let customer = Customer {
            id: CustomerId::new(),
            display_name: "Rani".to_string(),
            kyc_verified_up_to: Some(dec!(1_000_000)),
            risk_flagged: false,
        };
        let wallet = Wallet::new(
            customer.id,
            WalletMode::Persistent,
            Currency::Usd,
            limits,
            None,
            Utc::now(),
        );
        let invoice = Invoice::from_draft(
            InvoiceDraft {
                reference: "INV-9".to_string(),
                amount,
                currency: Currency::Usd,
                customer: customer.id,
                line_items: vec![],
                due_date: NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
            },
            wallet.id,
            Utc::now(),
        );
        (invoice, wallet, customer)
    }

    fn passing_verifier() -> MockComplianceVerificationService {
        let mut verifier = MockComplianceVerificationService::new();
        verifier
            .expect_check()
            .returning(|_, _| Ok(CheckOutcome::pass()));
        verifier
    }

    fn custom_rule(priority: i16, action: RuleAction) -> BusinessRule {
        BusinessRule {
            id: RuleId::new(),
            name: format!("custom p{priority}"),
            kind: RuleKind::Custom,
            priority,
            active: true,
            condition: RuleCondition::default(),
            action,
            check_order: None,
        }
    }

    fn engine() -> RuleEvaluationEngine {
        RuleEvaluationEngine::new(dec!(100_000))
    }

    fn input<'a>(
        invoice: &'a Invoice,
        wallet: &'a Wallet,
        customer: &'a Customer,
        rules: &'a [BusinessRule],
    ) -> EvaluationInput<'a> {
        EvaluationInput {
            wallet,
            invoice,
            customer,
            rules,
            window_usage: WindowUsage::default(),
            rolling_volume_30d: invoice.amount,
        }
    }

    #[test]
    fn test_clean_invoice_is_accepted() {
        let (invoice, wallet, customer) = fixture(dec!(2500), WalletLimits::unlimited());
        let outcome = engine()
            .evaluate(&input(&invoice, &wallet, &customer, &[]), &passing_verifier())
            .unwrap();
        assert!(outcome.verdict.is_accept());
        assert_eq!(outcome.compliance.len(), 3);
    }

    #[test]
    fn test_failed_check_blocks_with_compliance_reason() {
        let (invoice, wallet, mut customer) = fixture(dec!(200_000), WalletLimits::unlimited());
        customer.kyc_verified_up_to = None;

        let mut verifier = MockComplianceVerificationService::new();
        verifier.expect_check().returning(|_, check| match check {
            CheckName::Kyc => Ok(CheckOutcome::fail("no dossier")),
            _ => Ok(CheckOutcome::pass()),
        });

        let outcome = engine()
            .evaluate(&input(&invoice, &wallet, &customer, &[]), &verifier)
            .unwrap();
        assert_eq!(
            outcome.verdict.block_reason(),
            Some("compliance:KYC:no dossier")
        );
    }

    #[test]
    fn test_limit_violation_blocks_with_limit_reason() {
        let (invoice, wallet, customer) = fixture(
            dec!(400),
            WalletLimits {
                daily_max: Some(dec!(1000)),
                ..WalletLimits::unlimited()
            },
        );
        let mut ctx = input(&invoice, &wallet, &customer, &[]);
        ctx.window_usage = WindowUsage {
            day: dec!(700),
            month: dec!(700),
        };

        let outcome = engine().evaluate(&ctx, &passing_verifier()).unwrap();
        assert_eq!(outcome.verdict.block_reason(), Some("limit:DAILY_EXCEEDED"));
    }

    #[test]
    fn test_compliance_runs_before_limits() {
        // Both layers would block; the compliance reason must win.
        let (invoice, wallet, mut customer) = fixture(
            dec!(200_000),
            WalletLimits {
                per_transaction_max: Some(dec!(1)),
                ..WalletLimits::unlimited()
            },
        );
        customer.kyc_verified_up_to = None;

        let mut verifier = MockComplianceVerificationService::new();
        verifier.expect_check().returning(|_, check| match check {
            CheckName::Kyc => Ok(CheckOutcome::fail("no dossier")),
            _ => Ok(CheckOutcome::pass()),
        });

        let outcome = engine()
            .evaluate(&input(&invoice, &wallet, &customer, &[]), &verifier)
            .unwrap();
        assert!(
            outcome
                .verdict
                .block_reason()
                .unwrap()
                .starts_with("compliance:")
        );
    }

    #[test]
    fn test_first_matching_block_rule_wins() {
        let (invoice, wallet, customer) = fixture(dec!(2500), WalletLimits::unlimited());
        let rules = vec![
            custom_rule(
                10,
                RuleAction::Block {
                    reason: "late block".to_string(),
                },
            ),
            custom_rule(
                1,
                RuleAction::Block {
                    reason: "early block".to_string(),
                },
            ),
        ];

        let outcome = engine()
            .evaluate(&input(&invoice, &wallet, &customer, &rules), &passing_verifier())
            .unwrap();
        assert_eq!(outcome.verdict.block_reason(), Some("early block"));
    }

    #[test]
    fn test_required_checks_accumulate_and_dedup() {
        let (invoice, wallet, customer) = fixture(dec!(2500), WalletLimits::unlimited());
        let rules = vec![
            custom_rule(
                1,
                RuleAction::RequireAdditionalCheck {
                    check: CheckName::Sanctions,
                },
            ),
            custom_rule(
                2,
                RuleAction::RequireAdditionalCheck {
                    check: CheckName::Aml,
                },
            ),
            custom_rule(
                3,
                RuleAction::RequireAdditionalCheck {
                    check: CheckName::Sanctions,
                },
            ),
        ];

        let outcome = engine()
            .evaluate(&input(&invoice, &wallet, &customer, &rules), &passing_verifier())
            .unwrap();
        assert_eq!(
            outcome.verdict,
            Verdict::RequiresAdditionalCheck {
                checks: vec![CheckName::Sanctions, CheckName::Aml],
            }
        );
    }

    #[test]
    fn test_allow_rules_do_not_short_circuit() {
        let (invoice, wallet, customer) = fixture(dec!(2500), WalletLimits::unlimited());
        let rules = vec![
            custom_rule(1, RuleAction::Allow),
            custom_rule(
                2,
                RuleAction::Block {
                    reason: "blocked after allow".to_string(),
                },
            ),
        ];

        let outcome = engine()
            .evaluate(&input(&invoice, &wallet, &customer, &rules), &passing_verifier())
            .unwrap();
        assert_eq!(outcome.verdict.block_reason(), Some("blocked after allow"));
    }

    #[test]
    fn test_inactive_rules_are_invisible() {
        let (invoice, wallet, customer) = fixture(dec!(2500), WalletLimits::unlimited());
        let mut rule = custom_rule(
            1,
            RuleAction::Block {
                reason: "should not fire".to_string(),
            },
        );
        rule.active = false;

        let outcome = engine()
            .evaluate(&input(&invoice, &wallet, &customer, &[rule]), &passing_verifier())
            .unwrap();
        assert!(outcome.verdict.is_accept());
    }

    #[test]
    fn test_adaptive_conversion_is_annotated_not_blocking() {
        let (invoice, mut wallet, customer) = fixture(dec!(5100), WalletLimits::unlimited());
        wallet.mode = WalletMode::Adaptive;
        wallet.adaptive_threshold = Some(dec!(5000));

        let outcome = engine()
            .evaluate(&input(&invoice, &wallet, &customer, &[]), &passing_verifier())
            .unwrap();
        assert!(outcome.verdict.is_accept());
        assert!(outcome.mode.converted);
        assert_eq!(outcome.mode.mode, WalletMode::Persistent);
    }

    #[test]
    fn test_identical_inputs_identical_verdicts() {
        let (invoice, wallet, customer) = fixture(dec!(2500), WalletLimits::unlimited());
        let rules = vec![custom_rule(
            4,
            RuleAction::RequireAdditionalCheck {
                check: CheckName::Aml,
            },
        )];

        let first = engine()
            .evaluate(&input(&invoice, &wallet, &customer, &rules), &passing_verifier())
            .unwrap();
        let second = engine()
            .evaluate(&input(&invoice, &wallet, &customer, &rules), &passing_verifier())
            .unwrap();
        assert_eq!(first.verdict, second.verdict);
    }
}
