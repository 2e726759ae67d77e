//! Validation of the resolved term set.
//!
//! Content problems are data, never exceptions: the report carries error and
//! warning strings, and only hard errors trigger an automatic second-turn
//! re-extraction. Warnings surface for human review without re-invoking the
//! model.

use serde::{Deserialize, Serialize};

use crate::audit::{AuditTrail, Stage};
use crate::model::TermSet;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub needs_review: bool,
    pub needs_second_turn: bool,
}

/// Check required business fields on the resolved term set.
pub fn validate_terms(terms: &TermSet, audit: &mut AuditTrail) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if terms
        .buyer_names
        .as_ref()
        .is_none_or(|names| names.iter().all(|n| n.trim().is_empty()))
    {
        warnings.push("buyer names missing".to_string());
    }

    if terms
        .seller_names
        .as_ref()
        .is_none_or(|names| names.iter().all(|n| n.trim().is_empty()))
    {
        warnings.push("seller names missing".to_string());
    }

    match terms.property_address.as_deref().map(str::trim) {
        None | Some("") => warnings.push("property address missing".to_string()),
        Some(addr) if !address_plausible(addr) => {
            warnings.push(format!("property address {addr:?} looks incomplete"));
        }
        Some(_) => {}
    }

    // A zero price is certain evidence of extraction failure, never a true
    // zero-dollar contract.
    match terms.purchase_price {
        None => errors.push("purchase price missing".to_string()),
        Some(price) if price <= 0.0 => {
            errors.push(format!("purchase price is {price}, expected a positive amount"));
        }
        Some(_) => {}
    }

    if terms.effective_date.is_none() {
        warnings.push("effective date could not be determined".to_string());
    }

    for message in &errors {
        audit.record(Stage::Validate, format!("error: {message}"));
    }
    for message in &warnings {
        audit.record(Stage::Validate, format!("warning: {message}"));
    }

    let needs_second_turn = !errors.is_empty();
    let needs_review = needs_second_turn || !warnings.is_empty();
    ValidationReport {
        errors,
        warnings,
        needs_review,
        needs_second_turn,
    }
}

/// Minimal plausibility: a street address has a number and some letters, or
/// at least a comma-separated locality.
fn address_plausible(addr: &str) -> bool {
    let has_digit = addr.chars().any(|c| c.is_ascii_digit());
    let has_alpha = addr.chars().any(|c| c.is_alphabetic());
    (has_digit && has_alpha && addr.len() >= 8) || addr.contains(',')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_terms() -> TermSet {
        TermSet {
            buyer_names: Some(vec!["Pat Doe".into()]),
            seller_names: Some(vec!["Lee Roy".into()]),
            property_address: Some("123 Main St, Sacramento, CA 95814".into()),
            purchase_price: Some(510_000.0),
            effective_date: Some("2024-03-15".into()),
            ..Default::default()
        }
    }

    #[test]
    fn complete_terms_pass_clean() {
        let mut audit = AuditTrail::new();
        let report = validate_terms(&complete_terms(), &mut audit);
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        assert!(!report.needs_review);
        assert!(!report.needs_second_turn);
    }

    #[test]
    fn zero_price_is_an_error_and_triggers_second_turn() {
        let mut terms = complete_terms();
        terms.purchase_price = Some(0.0);
        let mut audit = AuditTrail::new();
        let report = validate_terms(&terms, &mut audit);

        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("purchase price"));
        assert!(report.needs_second_turn);
        assert!(report.needs_review);
    }

    #[test]
    fn missing_price_is_an_error() {
        let mut terms = complete_terms();
        terms.purchase_price = None;
        let mut audit = AuditTrail::new();
        let report = validate_terms(&terms, &mut audit);
        assert!(report.needs_second_turn);
    }

    #[test]
    fn warnings_alone_need_review_but_no_second_turn() {
        let mut terms = complete_terms();
        terms.seller_names = None;
        terms.effective_date = None;
        let mut audit = AuditTrail::new();
        let report = validate_terms(&terms, &mut audit);

        assert!(report.errors.is_empty());
        assert_eq!(report.warnings.len(), 2);
        assert!(report.needs_review);
        assert!(!report.needs_second_turn);
    }

    #[test]
    fn whitespace_names_count_as_missing() {
        let mut terms = complete_terms();
        terms.buyer_names = Some(vec!["   ".into()]);
        let mut audit = AuditTrail::new();
        let report = validate_terms(&terms, &mut audit);
        assert!(report.warnings.iter().any(|w| w.contains("buyer names")));
    }

    #[test]
    fn implausible_address_warns() {
        let mut terms = complete_terms();
        terms.property_address = Some("TBD".into());
        let mut audit = AuditTrail::new();
        let report = validate_terms(&terms, &mut audit);
        assert!(report.warnings.iter().any(|w| w.contains("looks incomplete")));
        assert!(audit.mentions(Stage::Validate, "warning"));
    }

    #[test]
    fn second_turn_implies_review() {
        let mut terms = complete_terms();
        terms.purchase_price = None;
        let mut audit = AuditTrail::new();
        let report = validate_terms(&terms, &mut audit);
        assert!(report.needs_second_turn && report.needs_review);
    }
}
