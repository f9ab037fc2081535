//! Spending limit enforcement.

pub mod enforcer;

pub use enforcer::{LimitEnforcer, LimitViolation, WindowUsage};
