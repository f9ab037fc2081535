//! In-memory implementations of the external seams.
//!
//! The verification service here is a verdict table, not a verifier:
//! real deployments adapt their provider behind the same trait. Tests
//! and the dev server script verdicts per customer and check.

use dashmap::DashMap;

use kasira_core::compliance::{
    CheckName, CheckOutcome, ComplianceVerificationService, VerificationError,
};
use kasira_core::customer::{Customer, CustomerDirectory};
use kasira_shared::types::CustomerId;

/// Scripted response for one (customer, check) pair.
#[derive(Debug, Clone)]
pub enum StubResponse {
    /// Return this outcome.
    Outcome(CheckOutcome),
    /// Simulate a deadline miss.
    Timeout,
    /// Simulate an unreachable provider.
    Unavailable(String),
}

/// Verification service backed by a scripted verdict table.
///
/// Unscripted pairs pass, so a freshly provisioned dev environment is
/// usable without seeding every check.
#[derive(Debug, Default)]
pub struct StaticComplianceService {
    responses: DashMap<(CustomerId, CheckName), StubResponse>,
}

impl StaticComplianceService {
    /// Creates a service where every check passes until scripted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the response for one (customer, check) pair.
    pub fn script(&self, customer: CustomerId, check: CheckName, response: StubResponse) {
        self.responses.insert((customer, check), response);
    }

    /// Scripts a failing outcome for one (customer, check) pair.
    pub fn fail(&self, customer: CustomerId, check: CheckName, reason: impl Into<String>) {
        self.script(
            customer,
            check,
            StubResponse::Outcome(CheckOutcome::fail(reason)),
        );
    }
}

impl ComplianceVerificationService for StaticComplianceService {
    fn check(
        &self,
        customer: CustomerId,
        check: CheckName,
    ) -> Result<CheckOutcome, VerificationError> {
        match self.responses.get(&(customer, check)).map(|r| r.clone()) {
            None => Ok(CheckOutcome::pass()),
            Some(StubResponse::Outcome(outcome)) => Ok(outcome),
            Some(StubResponse::Timeout) => Err(VerificationError::Timeout),
            Some(StubResponse::Unavailable(reason)) => {
                Err(VerificationError::Unavailable(reason))
            }
        }
    }
}

/// Customer directory backed by an in-memory table.
#[derive(Debug, Default)]
pub struct InMemoryCustomerDirectory {
    customers: DashMap<CustomerId, Customer>,
}

impl InMemoryCustomerDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a customer record.
    pub fn upsert(&self, customer: Customer) {
        self.customers.insert(customer.id, customer);
    }
}

impl CustomerDirectory for InMemoryCustomerDirectory {
    fn get(&self, id: CustomerId) -> Option<Customer> {
        self.customers.get(&id).map(|c| c.clone())
    }
}
