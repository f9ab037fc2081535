//! Business rule types and deterministic ordering.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kasira_shared::types::{Currency, RuleId};

use crate::compliance::CheckName;
use crate::customer::Customer;
use crate::invoice::Invoice;
use crate::wallet::{Wallet, WalletMode};

/// What concern a rule addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Governs compliance check behavior (hard blocks, check order).
    Compliance,
    /// Annotates the limit layer; limits themselves live on the wallet.
    Limit,
    /// Governs threshold-driven behavior such as mode conversion.
    Threshold,
    /// Administrator-defined business rule run after the built-in chain.
    Custom,
}

/// What a matching rule does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RuleAction {
    /// Explicit allow-through; evaluation continues.
    Allow,
    /// Stop evaluation with this rule's reason.
    Block {
        /// Reason surfaced to the caller.
        reason: String,
    },
    /// Ask the caller to gather an additional check without losing the
    /// invoice state already collected.
    RequireAdditionalCheck {
        /// The check the caller must provide.
        check: CheckName,
    },
}

/// Declarative predicate over invoice, wallet, and customer attributes.
///
/// Every populated field must match; empty collections and `None` match
/// anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCondition {
    /// Minimum invoice amount (inclusive).
    pub min_amount: Option<Decimal>,
    /// Maximum invoice amount (inclusive).
    pub max_amount: Option<Decimal>,
    /// Wallet modes this rule applies to; empty = all.
    pub wallet_modes: Vec<WalletMode>,
    /// Currencies this rule applies to; empty = all.
    pub currencies: Vec<Currency>,
    /// Restrict to customers flagged as elevated risk.
    pub flagged_customers_only: bool,
    /// For compliance rules: the failing check this rule governs;
    /// `None` = any check.
    pub check: Option<CheckName>,
}

impl RuleCondition {
    /// Evaluates the condition against one wallet-invoice-customer triple.
    #[must_use]
    pub fn matches(&self, invoice: &Invoice, wallet: &Wallet, customer: &Customer) -> bool {
        let above_min = self.min_amount.is_none_or(|min| invoice.amount >= min);
        let below_max = self.max_amount.is_none_or(|max| invoice.amount <= max);
        let mode_ok = self.wallet_modes.is_empty() || self.wallet_modes.contains(&wallet.mode);
        let currency_ok =
            self.currencies.is_empty() || self.currencies.contains(&invoice.currency);
        let flag_ok = !self.flagged_customers_only || customer.risk_flagged;

        above_min && below_max && mode_ok && currency_ok && flag_ok
    }

    /// Returns true when this condition governs a failure of `check`.
    #[must_use]
    pub fn governs_check(&self, check: CheckName) -> bool {
        self.check.is_none_or(|governed| governed == check)
    }
}

/// An administrator-managed business rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessRule {
    /// The rule ID.
    pub id: RuleId,
    /// Human-readable name.
    pub name: String,
    /// Concern the rule addresses.
    pub kind: RuleKind,
    /// Evaluation priority; lower runs first.
    pub priority: i16,
    /// Inactive rules are invisible to the engine.
    pub active: bool,
    /// When the rule applies.
    pub condition: RuleCondition,
    /// What a match does.
    pub action: RuleAction,
    /// For compliance rules: overrides the gate's check order.
    pub check_order: Option<Vec<CheckName>>,
}

/// Filters to active rules and orders them by `(priority, id)`.
///
/// The id tie-break keeps evaluation deterministic when an administrator
/// assigns the same priority twice.
#[must_use]
pub fn active_in_order(rules: &[BusinessRule]) -> Vec<&BusinessRule> {
    let mut active: Vec<&BusinessRule> = rules.iter().filter(|r| r.active).collect();
    active.sort_by_key(|r| (r.priority, r.id));
    active
}
