//! Compliance gate: KYC / AML / Sanctions policy layer.
//!
//! The gate consumes pass/fail verdicts from an external verification
//! service; it never implements document verification itself.

pub mod gate;
pub mod types;

pub use gate::ComplianceGate;
pub use types::{
    CheckName, CheckOutcome, CheckStatus, ComplianceCheckResult, ComplianceVerificationService,
    VerificationError,
};
