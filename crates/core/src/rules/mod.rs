//! Business rule table read by the evaluation engine.
//!
//! Rules are administered outside the engine; evaluation only ever reads
//! active rules, ordered by priority then id for determinism.

pub mod types;

pub use types::{BusinessRule, RuleAction, RuleCondition, RuleKind, active_in_order};
