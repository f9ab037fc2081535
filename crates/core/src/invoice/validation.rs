//! Draft invoice validation.
//!
//! All checks here are shape checks on the submitted fields; wallet-
//! dependent checks (currency match, duplicate reference, limits) run
//! later in the evaluation pipeline.

use kasira_shared::types::money::is_payable_amount;
use kasira_shared::{EngineError, EngineResult};

use super::types::InvoiceDraft;

/// Validates a caller-submitted invoice draft.
///
/// # Errors
///
/// `Validation` when the reference is blank, the amount is not a
/// positive whole number of minor units, a line item is malformed, or
/// the line items disagree with the invoice total.
pub fn validate_draft(draft: &InvoiceDraft) -> EngineResult<()> {
    if draft.reference.trim().is_empty() {
        return Err(EngineError::Validation(
            "invoice reference must not be blank".to_string(),
        ));
    }

    if !is_payable_amount(draft.amount) {
        return Err(EngineError::Validation(format!(
            "invoice amount must be a positive whole number of minor units, got {}",
            draft.amount
        )));
    }

    for (index, line) in draft.line_items.iter().enumerate() {
        if line.description.trim().is_empty() {
            return Err(EngineError::Validation(format!(
                "line item {index} has a blank description"
            )));
        }
        if line.quantity == 0 {
            return Err(EngineError::Validation(format!(
                "line item {index} has zero quantity"
            )));
        }
        if !is_payable_amount(line.unit_price) {
            return Err(EngineError::Validation(format!(
                "line item {index} unit price must be a positive whole number of minor units"
            )));
        }
    }

    // When line items are present they must account for the full total.
    if !draft.line_items.is_empty() {
        let lines_total: rust_decimal::Decimal =
            draft.line_items.iter().map(super::types::LineItem::extended).sum();
        if lines_total != draft.amount {
            return Err(EngineError::Validation(format!(
                "line items total {lines_total} does not match invoice amount {}",
                draft.amount
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::types::LineItem;
    use chrono::NaiveDate;
    use kasira_shared::types::{Currency, CustomerId};
    use rstest::rstest;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn draft(amount: Decimal, line_items: Vec<LineItem>) -> InvoiceDraft {
        InvoiceDraft {
            reference: "INV-42".to_string(),
            amount,
            currency: Currency::Usd,
            customer: CustomerId::new(),
            line_items,
            due_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
        }
    }

    #[test]
    fn test_bare_amount_draft_is_valid() {
        assert!(validate_draft(&draft(dec!(1500), vec![])).is_ok());
    }

    #[rstest]
    #[case(dec!(0))]
    #[case(dec!(-100))]
    #[case(dec!(10.5))]
    fn test_bad_amounts_rejected(#[case] amount: Decimal) {
        assert!(validate_draft(&draft(amount, vec![])).is_err());
    }

    #[test]
    fn test_blank_reference_rejected() {
        let mut d = draft(dec!(100), vec![]);
        d.reference = "   ".to_string();
        assert!(validate_draft(&d).is_err());
    }

    #[test]
    fn test_line_items_must_sum_to_amount() {
        let lines = vec![
            LineItem {
                description: "widget".to_string(),
                quantity: 2,
                unit_price: dec!(300),
            },
            LineItem {
                description: "shipping".to_string(),
                quantity: 1,
                unit_price: dec!(400),
            },
        ];
        assert!(validate_draft(&draft(dec!(1000), lines.clone())).is_ok());
        assert!(validate_draft(&draft(dec!(999), lines)).is_err());
    }

    #[test]
    fn test_zero_quantity_line_rejected() {
        let lines = vec![LineItem {
            description: "widget".to_string(),
            quantity: 0,
            unit_price: dec!(100),
        }];
        assert!(validate_draft(&draft(dec!(100), lines)).is_err());
    }
}
