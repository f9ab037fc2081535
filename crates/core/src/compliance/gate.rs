//! The compliance gate.
//!
//! Runs the configured checks for one invoice evaluation and aggregates
//! their results. The gate is not restartable: re-invocation re-runs
//! every check from scratch, there is no cached partial state.

use rust_decimal::Decimal;

use kasira_shared::{EngineError, EngineResult};

use crate::customer::Customer;
use crate::invoice::Invoice;
use crate::rules::{BusinessRule, RuleAction, RuleKind};
use crate::wallet::Wallet;

use super::types::{
    CheckName, ComplianceCheckResult, ComplianceVerificationService, VerificationError,
};

/// Compliance gate for one engine instance.
pub struct ComplianceGate {
    /// Invoice amount at or above which KYC re-runs even for customers
    /// verified at a lower amount (re-verification on step-up).
    kyc_required_threshold: Decimal,
}

impl ComplianceGate {
    /// Creates a gate with the given step-up threshold in minor units.
    #[must_use]
    pub fn new(kyc_required_threshold: Decimal) -> Self {
        Self {
            kyc_required_threshold,
        }
    }

    /// Runs the checks for one invoice and returns every result produced.
    ///
    /// Checks run in {KYC, AML, Sanctions} order unless an active
    /// compliance rule that matches this evaluation overrides the order.
    /// A failing check stops the run early only when a matching
    /// compliance rule marks that failure as a hard block; otherwise all
    /// checks run so the caller can present a complete remediation list.
    ///
    /// # Errors
    ///
    /// `ComplianceTimeout` when the verification service misses its
    /// deadline for a check.
    pub fn evaluate(
        &self,
        invoice: &Invoice,
        wallet: &Wallet,
        customer: &Customer,
        ordered_rules: &[&BusinessRule],
        verifier: &dyn ComplianceVerificationService,
    ) -> EngineResult<Vec<ComplianceCheckResult>> {
        let order = Self::check_order(invoice, wallet, customer, ordered_rules);
        let mut results = Vec::with_capacity(order.len());

        for check in order {
            let result = self.run_check(check, invoice, customer, verifier)?;
            let failed = !result.is_passed();
            results.push(result);

            if failed && Self::is_hard_block(check, invoice, wallet, customer, ordered_rules) {
                break;
            }
        }

        Ok(results)
    }

    /// Returns true iff every produced result passed.
    #[must_use]
    pub fn all_passed(results: &[ComplianceCheckResult]) -> bool {
        results.iter().all(ComplianceCheckResult::is_passed)
    }

    fn run_check(
        &self,
        check: CheckName,
        invoice: &Invoice,
        customer: &Customer,
        verifier: &dyn ComplianceVerificationService,
    ) -> EngineResult<ComplianceCheckResult> {
        if check == CheckName::Kyc
            && invoice.amount < self.kyc_required_threshold
            && customer.kyc_covers(invoice.amount)
        {
            // An existing verification covers this amount and the invoice
            // is below the step-up threshold: no external call.
            return Ok(ComplianceCheckResult::passed(check));
        }

        match verifier.check(customer.id, check) {
            Ok(outcome) if outcome.passed => Ok(ComplianceCheckResult::passed(check)),
            Ok(outcome) => Ok(ComplianceCheckResult::failed(
                check,
                outcome.reason.unwrap_or_else(|| "check failed".to_string()),
            )),
            Err(VerificationError::Timeout) => {
                Err(EngineError::ComplianceTimeout(check.as_str().to_string()))
            }
            // Fail closed: an unreachable verifier blocks, it never waves through.
            Err(VerificationError::Unavailable(reason)) => Ok(ComplianceCheckResult::failed(
                check,
                format!("verification unavailable: {reason}"),
            )),
        }
    }

    /// The order checks run in for this evaluation.
    ///
    /// Checks missing from a rule's override still run, after the
    /// overridden ones.
    fn check_order(
        invoice: &Invoice,
        wallet: &Wallet,
        customer: &Customer,
        ordered_rules: &[&BusinessRule],
    ) -> Vec<CheckName> {
        let override_order = ordered_rules.iter().find_map(|rule| {
            (rule.kind == RuleKind::Compliance
                && rule.check_order.is_some()
                && rule.condition.matches(invoice, wallet, customer))
            .then(|| rule.check_order.clone().unwrap_or_default())
        });

        let mut order = override_order.unwrap_or_default();
        if order.is_empty() {
            return CheckName::DEFAULT_ORDER.to_vec();
        }
        for check in CheckName::DEFAULT_ORDER {
            if !order.contains(&check) {
                order.push(check);
            }
        }
        order
    }

    fn is_hard_block(
        check: CheckName,
        invoice: &Invoice,
        wallet: &Wallet,
        customer: &Customer,
        ordered_rules: &[&BusinessRule],
    ) -> bool {
        ordered_rules.iter().any(|rule| {
            rule.kind == RuleKind::Compliance
                && matches!(rule.action, RuleAction::Block { .. })
                && rule.condition.governs_check(check)
                && rule.condition.matches(invoice, wallet, customer)
        })
    }
}
