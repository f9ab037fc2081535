//! Compliance check types and the verification service seam.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use kasira_shared::types::CustomerId;

/// The checks the gate knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckName {
    /// Know-your-customer identity verification.
    Kyc,
    /// Anti-money-laundering screening.
    Aml,
    /// Sanctions list screening.
    Sanctions,
}

impl CheckName {
    /// The default order checks run in, absent a rule override.
    pub const DEFAULT_ORDER: [Self; 3] = [Self::Kyc, Self::Aml, Self::Sanctions];

    /// Stable name used in block reasons (`compliance:KYC:...`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Kyc => "KYC",
            Self::Aml => "AML",
            Self::Sanctions => "Sanctions",
        }
    }
}

impl std::fmt::Display for CheckName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pass/fail status of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// The check passed.
    Passed,
    /// The check failed; a reason is attached.
    Failed,
}

/// Result of one compliance check within one evaluation.
///
/// Not persisted beyond the evaluation's audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceCheckResult {
    /// Which check ran.
    pub check: CheckName,
    /// Its status.
    pub status: CheckStatus,
    /// Failure reason; present iff `status` is `Failed`.
    pub reason: Option<String>,
}

impl ComplianceCheckResult {
    /// A passed check.
    #[must_use]
    pub fn passed(check: CheckName) -> Self {
        Self {
            check,
            status: CheckStatus::Passed,
            reason: None,
        }
    }

    /// A failed check with its reason.
    #[must_use]
    pub fn failed(check: CheckName, reason: impl Into<String>) -> Self {
        Self {
            check,
            status: CheckStatus::Failed,
            reason: Some(reason.into()),
        }
    }

    /// Returns true if the check passed.
    #[must_use]
    pub fn is_passed(&self) -> bool {
        self.status == CheckStatus::Passed
    }
}

/// Verdict returned by the external verification service for one check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOutcome {
    /// Whether the check passed.
    pub passed: bool,
    /// Failure reason when it did not.
    pub reason: Option<String>,
}

impl CheckOutcome {
    /// A passing outcome.
    #[must_use]
    pub fn pass() -> Self {
        Self {
            passed: true,
            reason: None,
        }
    }

    /// A failing outcome with its reason.
    #[must_use]
    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Failure modes of the external verification call.
#[derive(Debug, Clone, Error)]
pub enum VerificationError {
    /// The bounded call deadline elapsed.
    #[error("verification call timed out")]
    Timeout,
    /// The service rejected or could not serve the call.
    #[error("verification service unavailable: {0}")]
    Unavailable(String),
}

/// External compliance verification service.
///
/// Calls are synchronous and timeout-bounded; implementations enforce
/// their own deadline and surface [`VerificationError::Timeout`].
#[cfg_attr(test, mockall::automock)]
pub trait ComplianceVerificationService: Send + Sync {
    /// Runs one check for one customer.
    fn check(
        &self,
        customer: CustomerId,
        check: CheckName,
    ) -> Result<CheckOutcome, VerificationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_names() {
        assert_eq!(CheckName::Kyc.as_str(), "KYC");
        assert_eq!(CheckName::Aml.to_string(), "AML");
        assert_eq!(CheckName::Sanctions.as_str(), "Sanctions");
    }

    #[test]
    fn test_default_order() {
        assert_eq!(
            CheckName::DEFAULT_ORDER,
            [CheckName::Kyc, CheckName::Aml, CheckName::Sanctions]
        );
    }

    #[test]
    fn test_result_constructors() {
        let pass = ComplianceCheckResult::passed(CheckName::Aml);
        assert!(pass.is_passed());
        assert!(pass.reason.is_none());

        let fail = ComplianceCheckResult::failed(CheckName::Kyc, "no dossier");
        assert!(!fail.is_passed());
        assert_eq!(fail.reason.as_deref(), Some("no dossier"));
    }
}
