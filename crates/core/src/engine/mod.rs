//! The rule evaluation engine.
//!
//! Sequences mode selection, the compliance gate, the limit enforcer,
//! and custom business rules into a single verdict.

pub mod evaluation;
pub mod verdict;

#[cfg(test)]
mod evaluation_props;

pub use evaluation::{EvaluationInput, EvaluationOutcome, RuleEvaluationEngine};
pub use verdict::Verdict;
