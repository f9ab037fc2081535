//! Business rule repository.
//!
//! Rules are administered out-of-band; the engine only ever reads them.

use dashmap::DashMap;

use kasira_core::rules::BusinessRule;
use kasira_shared::types::RuleId;
use kasira_shared::{EngineError, EngineResult};

/// In-memory business rule table.
#[derive(Debug, Default)]
pub struct RuleRepository {
    rules: DashMap<RuleId, BusinessRule>,
}

impl RuleRepository {
    /// Creates an empty rule table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a rule.
    pub fn upsert(&self, rule: BusinessRule) {
        self.rules.insert(rule.id, rule);
    }

    /// Flips a rule's active flag.
    ///
    /// # Errors
    ///
    /// `Validation` for an unknown rule id.
    pub fn set_active(&self, id: RuleId, active: bool) -> EngineResult<()> {
        let mut rule = self
            .rules
            .get_mut(&id)
            .ok_or_else(|| EngineError::Validation(format!("unknown rule: {id}")))?;
        rule.active = active;
        Ok(())
    }

    /// Snapshot of the whole table; the engine filters and orders it.
    #[must_use]
    pub fn all(&self) -> Vec<BusinessRule> {
        self.rules.iter().map(|r| r.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kasira_core::rules::{RuleAction, RuleCondition, RuleKind};

    fn rule() -> BusinessRule {
        BusinessRule {
            id: RuleId::new(),
            name: "test rule".to_string(),
            kind: RuleKind::Custom,
            priority: 5,
            active: true,
            condition: RuleCondition::default(),
            action: RuleAction::Allow,
            check_order: None,
        }
    }

    #[test]
    fn test_upsert_and_all() {
        let repo = RuleRepository::new();
        let r = rule();
        repo.upsert(r.clone());
        repo.upsert(rule());
        assert_eq!(repo.all().len(), 2);

        let mut replacement = r.clone();
        replacement.priority = 1;
        repo.upsert(replacement);
        assert_eq!(repo.all().len(), 2);
    }

    #[test]
    fn test_set_active() {
        let repo = RuleRepository::new();
        let r = rule();
        repo.upsert(r.clone());
        repo.set_active(r.id, false).unwrap();
        assert!(!repo.all()[0].active);
        assert!(repo.set_active(RuleId::new(), true).is_err());
    }
}
