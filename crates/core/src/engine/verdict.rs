//! The engine's verdict type.
//!
//! A tagged variant rather than exception-based control flow: callers
//! branch on the kind without catching anything.

use serde::Serialize;

use kasira_shared::EngineError;

use crate::compliance::CheckName;

/// Outcome of evaluating one invoice against the rule chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// The invoice may proceed to reserve/capture.
    Accept,
    /// The invoice is rejected with the failing rule's reason.
    Block {
        /// Reason in stable `layer:detail` form, e.g.
        /// `compliance:KYC:no dossier` or `limit:DAILY_EXCEEDED`.
        reason: String,
    },
    /// No rule blocked, but the caller must gather additional checks
    /// before resubmitting; already-gathered invoice state is kept.
    RequiresAdditionalCheck {
        /// The checks still required, in rule order.
        checks: Vec<CheckName>,
    },
}

impl Verdict {
    /// Returns true for `Accept`.
    #[must_use]
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }

    /// The block reason, if this verdict is a block.
    #[must_use]
    pub fn block_reason(&self) -> Option<&str> {
        match self {
            Self::Block { reason } => Some(reason),
            _ => None,
        }
    }

    /// Converts a blocking verdict into its typed engine error.
    ///
    /// The `layer:detail` reason format is stable, so callers that treat
    /// blocks as failures get `ComplianceBlocked` / `LimitExceeded`
    /// instead of a bare string. Non-blocking verdicts map to `None`.
    #[must_use]
    pub fn as_engine_error(&self) -> Option<EngineError> {
        let reason = self.block_reason()?;
        Some(match reason.split_once(':') {
            Some(("compliance", rest)) => {
                let (check, detail) = rest.split_once(':').unwrap_or((rest, ""));
                EngineError::ComplianceBlocked {
                    check: check.to_string(),
                    reason: detail.to_string(),
                }
            }
            Some(("limit", violation)) => EngineError::LimitExceeded(violation.to_string()),
            _ => EngineError::Validation(reason.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert!(Verdict::Accept.is_accept());
        assert!(Verdict::Accept.block_reason().is_none());

        let block = Verdict::Block {
            reason: "limit:PER_TX_EXCEEDED".to_string(),
        };
        assert!(!block.is_accept());
        assert_eq!(block.block_reason(), Some("limit:PER_TX_EXCEEDED"));

        let requires = Verdict::RequiresAdditionalCheck {
            checks: vec![CheckName::Kyc],
        };
        assert!(!requires.is_accept());
        assert!(requires.block_reason().is_none());
    }

    #[test]
    fn test_block_verdicts_map_to_typed_errors() {
        let compliance = Verdict::Block {
            reason: "compliance:KYC:no dossier".to_string(),
        };
        match compliance.as_engine_error() {
            Some(EngineError::ComplianceBlocked { check, reason }) => {
                assert_eq!(check, "KYC");
                assert_eq!(reason, "no dossier");
            }
            other => panic!("unexpected mapping: {other:?}"),
        }

        let limit = Verdict::Block {
            reason: "limit:DAILY_EXCEEDED".to_string(),
        };
        assert!(matches!(
            limit.as_engine_error(),
            Some(EngineError::LimitExceeded(violation)) if violation == "DAILY_EXCEEDED"
        ));

        let custom = Verdict::Block {
            reason: "weekend payouts are disabled".to_string(),
        };
        assert!(matches!(
            custom.as_engine_error(),
            Some(EngineError::Validation(_))
        ));

        assert!(Verdict::Accept.as_engine_error().is_none());
    }
}
