//! Customer directory seam.
//!
//! The engine never owns customer records; it reads them through
//! [`CustomerDirectory`] when evaluating compliance rules.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kasira_shared::types::CustomerId;

/// A customer as seen by the rule engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    /// The customer ID.
    pub id: CustomerId,
    /// Display name for audit records.
    pub display_name: String,
    /// Largest invoice amount (minor units) this customer has passed
    /// KYC for, if any. Step-up invoices above this force a re-check.
    pub kyc_verified_up_to: Option<Decimal>,
    /// Whether the customer is flagged as elevated risk.
    pub risk_flagged: bool,
}

impl Customer {
    /// Returns true if an existing KYC verification covers `amount`.
    #[must_use]
    pub fn kyc_covers(&self, amount: Decimal) -> bool {
        self.kyc_verified_up_to.is_some_and(|up_to| amount <= up_to)
    }
}

/// Read-only lookup of customer records.
pub trait CustomerDirectory: Send + Sync {
    /// Fetches a customer by ID, or `None` if unknown.
    fn get(&self, id: CustomerId) -> Option<Customer>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn customer(kyc_verified_up_to: Option<Decimal>) -> Customer {
        Customer {
            id: CustomerId::new(),
            display_name: "Ana".to_string(),
            kyc_verified_up_to,
            risk_flagged: false,
        }
    }

    #[test]
    fn test_kyc_covers_lower_amounts() {
        let c = customer(Some(dec!(50_000)));
        assert!(c.kyc_covers(dec!(40_000)));
        assert!(c.kyc_covers(dec!(50_000)));
        assert!(!c.kyc_covers(dec!(50_001)));
    }

    #[test]
    fn test_no_kyc_covers_nothing() {
        let c = customer(None);
        assert!(!c.kyc_covers(dec!(1)));
    }
}
