//! Temporal resolution: effective date, closing date, contingency deadlines.
//!
//! Runs after merge. Heterogeneous date strings (M/D/YY, M/D/YYYY,
//! YYYY-MM-DD, free-form) are normalized to canonical `YYYY-MM-DD`, for
//! which lexicographic comparison is chronological.

use chrono::{Duration, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

use crate::audit::{AuditTrail, Stage};
use crate::model::{Closing, Contingency, PageTerms, TermSet};

const CANONICAL: &str = "%Y-%m-%d";

/// Normalize a date string to `YYYY-MM-DD`. Returns `None` when nothing
/// date-like can be recovered.
pub fn normalize_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in [CANONICAL, "%m/%d/%Y", "%m/%d/%y", "%m-%d-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date.format(CANONICAL).to_string());
        }
    }

    freeform_date(trimmed).map(|d| d.format(CANONICAL).to_string())
}

/// Free-form fallback: fish a date out of surrounding prose, e.g.
/// `"on or before March 15, 2024"` or `"COE: 3/15/24 per counter"`.
fn freeform_date(text: &str) -> Option<NaiveDate> {
    static NUMERIC: OnceLock<Regex> = OnceLock::new();
    static MONTH_NAME: OnceLock<Regex> = OnceLock::new();

    let numeric = NUMERIC
        .get_or_init(|| Regex::new(r"(\d{1,4})[/-](\d{1,2})[/-](\d{2,4})").expect("static regex"));
    if let Some(cap) = numeric.captures(text) {
        let a: i32 = cap[1].parse().ok()?;
        let b: u32 = cap[2].parse().ok()?;
        let c: i32 = cap[3].parse().ok()?;
        // YYYY-M-D when the first component is a year, else M/D/Y.
        let date = if a >= 1000 {
            NaiveDate::from_ymd_opt(a, b, c as u32)
        } else {
            let year = if c < 100 { expand_two_digit_year(c) } else { c };
            NaiveDate::from_ymd_opt(year, a as u32, b)
        };
        if date.is_some() {
            return date;
        }
    }

    let month_name = MONTH_NAME.get_or_init(|| {
        Regex::new(r"(?i)(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{1,2}),?\s+(\d{4})")
            .expect("static regex")
    });
    let cap = month_name.captures(text)?;
    let month = match cap[1].to_ascii_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        _ => 12,
    };
    let day: u32 = cap[2].parse().ok()?;
    let year: i32 = cap[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn expand_two_digit_year(two: i32) -> i32 {
    // Same pivot chrono uses for %y.
    if two <= 68 {
        2000 + two
    } else {
        1900 + two
    }
}

/// Add a day offset to a canonical `YYYY-MM-DD` date.
pub fn add_days(canonical: &str, days: i64) -> Option<String> {
    let date = NaiveDate::parse_from_str(canonical, CANONICAL).ok()?;
    Some((date + Duration::days(days)).format(CANONICAL).to_string())
}

/// Derive the effective date and resolve closing/contingency deadlines on
/// the merged term set. Signature dates are read from every page record,
/// not just the merged arrays: a date visible only on a page that lost a
/// merge still counts toward acceptance.
pub fn resolve_dates(terms: &mut TermSet, pages: &[PageTerms], audit: &mut AuditTrail) {
    resolve_effective_date(terms, pages, audit);
    resolve_closing_date(terms, audit);
    resolve_contingency_deadlines(terms, audit);
}

fn resolve_effective_date(terms: &mut TermSet, pages: &[PageTerms], audit: &mut AuditTrail) {
    let mut normalized: Vec<String> = Vec::new();
    for page in pages {
        for raw in page
            .buyer_signature_dates
            .iter()
            .flatten()
            .chain(page.seller_signature_dates.iter().flatten())
        {
            match normalize_date(raw) {
                Some(date) => normalized.push(date),
                None => audit.record(
                    Stage::Temporal,
                    format!("unparseable signature date {raw:?} on page {}", page.page_number),
                ),
            }
        }
    }

    // Lexicographic max is chronological max for YYYY-MM-DD.
    match normalized.iter().max() {
        Some(latest) => {
            audit.record(
                Stage::Temporal,
                format!(
                    "effective date {latest} (latest of {} signature dates)",
                    normalized.len()
                ),
            );
            terms.effective_date = Some(latest.clone());
        }
        None => {
            audit.record(Stage::Temporal, "no signature dates found; effective date unset");
        }
    }
}

fn resolve_closing_date(terms: &mut TermSet, audit: &mut AuditTrail) {
    // (1) Explicit close-of-escrow date wins outright.
    if let Some(explicit) = terms.closing.as_ref().and_then(|c| c.close_of_escrow_date.clone()) {
        match normalize_date(&explicit) {
            Some(date) => {
                audit.record(Stage::Temporal, format!("closing date {date} (explicit)"));
                if let Some(closing) = terms.closing.as_mut() {
                    closing.close_of_escrow_date = Some(date);
                }
                return;
            }
            None => audit.record(
                Stage::Temporal,
                format!("explicit closing date {explicit:?} is unparseable; falling through"),
            ),
        }
    }

    // (2) Day offset from the effective date.
    let offset = terms.closing.as_ref().and_then(|c| c.days_after_acceptance);
    if let (Some(days), Some(effective)) = (offset, terms.effective_date.as_deref()) {
        if let Some(date) = add_days(effective, days) {
            audit.record(
                Stage::Temporal,
                format!("closing date {date} ({days} days after acceptance {effective})"),
            );
            set_close_of_escrow(terms, date);
            return;
        }
    }

    // (3) Legacy flat field: literal date, else a bare day count.
    if let Some(legacy) = terms.closing_date.clone() {
        if let Some(date) = normalize_date(&legacy) {
            audit.record(
                Stage::Temporal,
                format!("closing date {date} (legacy field, literal date)"),
            );
            set_close_of_escrow(terms, date);
            return;
        }
        if let Ok(days) = legacy.trim().parse::<i64>() {
            if let Some(effective) = terms.effective_date.as_deref() {
                if let Some(date) = add_days(effective, days) {
                    audit.record(
                        Stage::Temporal,
                        format!("closing date {date} (legacy field, {days}-day count)"),
                    );
                    set_close_of_escrow(terms, date);
                    return;
                }
            }
        }
    }

    // (4) Unresolvable.
    audit.record(Stage::Temporal, "closing date unresolved");
}

fn set_close_of_escrow(terms: &mut TermSet, date: String) {
    terms
        .closing
        .get_or_insert_with(Closing::default)
        .close_of_escrow_date = Some(date);
}

fn resolve_contingency_deadlines(terms: &mut TermSet, audit: &mut AuditTrail) {
    let effective = terms.effective_date.clone();
    let Some(contingencies) = terms.contingencies.as_mut() else {
        return;
    };

    for (name, slot) in [
        ("inspection", &mut contingencies.inspection),
        ("appraisal", &mut contingencies.appraisal),
        ("loan", &mut contingencies.loan),
    ] {
        let Some(contingency) = slot.as_mut() else { continue };
        if let Some(deadline) = deadline_for(contingency, effective.as_deref()) {
            audit.record(
                Stage::Temporal,
                format!("{name} contingency deadline {deadline}"),
            );
            contingency.calculated_deadline = Some(deadline);
        }
    }
}

fn deadline_for(contingency: &Contingency, effective: Option<&str>) -> Option<String> {
    if let Some(date) = contingency.specific_date.as_deref().and_then(normalize_date) {
        return Some(date);
    }
    let days = contingency.days_after_acceptance?;
    add_days(effective?, days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Contingencies;
    use crate::role::PageRole;

    #[test]
    fn normalizes_common_formats() {
        assert_eq!(normalize_date("03/15/2024").as_deref(), Some("2024-03-15"));
        assert_eq!(normalize_date("3/15/24").as_deref(), Some("2024-03-15"));
        assert_eq!(normalize_date("2024-03-15").as_deref(), Some("2024-03-15"));
        assert_eq!(normalize_date("03-15-2024").as_deref(), Some("2024-03-15"));
    }

    #[test]
    fn normalizes_freeform_text() {
        assert_eq!(
            normalize_date("signed on March 15, 2024 by buyer").as_deref(),
            Some("2024-03-15")
        );
        assert_eq!(normalize_date("COE 4/1/24 per SCO").as_deref(), Some("2024-04-01"));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(normalize_date(""), None);
        assert_eq!(normalize_date("n/a"), None);
        assert_eq!(normalize_date("13/45/2024"), None);
    }

    #[test]
    fn day_offset_round_trip() {
        assert_eq!(add_days("2024-03-15", 30).as_deref(), Some("2024-04-14"));
    }

    fn page_with_dates(n: u32, buyer: &[&str], seller: &[&str]) -> PageTerms {
        PageTerms {
            page_number: n,
            page_label: format!("PAGE {n}"),
            page_role: PageRole::MainContract,
            buyer_signature_dates: Some(buyer.iter().map(|s| s.to_string()).collect()),
            seller_signature_dates: Some(seller.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }
    }

    #[test]
    fn effective_date_is_latest_signature_anywhere() {
        let pages = vec![
            page_with_dates(1, &["03/14/2024"], &[]),
            page_with_dates(9, &[], &["3/15/24"]),
        ];
        let mut terms = TermSet::default();
        let mut audit = AuditTrail::new();
        resolve_dates(&mut terms, &pages, &mut audit);

        assert_eq!(terms.effective_date.as_deref(), Some("2024-03-15"));
        assert!(audit.mentions(Stage::Temporal, "effective date 2024-03-15"));
    }

    #[test]
    fn explicit_closing_date_wins_over_offset() {
        let pages = vec![page_with_dates(1, &["03/15/2024"], &[])];
        let mut terms = TermSet {
            closing: Some(Closing {
                close_of_escrow_date: Some("05/01/2024".into()),
                days_after_acceptance: Some(30),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut audit = AuditTrail::new();
        resolve_dates(&mut terms, &pages, &mut audit);

        assert_eq!(
            terms.closing.unwrap().close_of_escrow_date.as_deref(),
            Some("2024-05-01")
        );
    }

    #[test]
    fn offset_closing_date_from_effective() {
        let pages = vec![page_with_dates(1, &["03/15/2024"], &[])];
        let mut terms = TermSet {
            closing: Some(Closing {
                days_after_acceptance: Some(30),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut audit = AuditTrail::new();
        resolve_dates(&mut terms, &pages, &mut audit);

        assert_eq!(
            terms.closing.unwrap().close_of_escrow_date.as_deref(),
            Some("2024-04-14")
        );
    }

    #[test]
    fn legacy_field_as_literal_date_then_day_count() {
        let pages = vec![page_with_dates(1, &["03/15/2024"], &[])];

        let mut literal = TermSet {
            closing_date: Some("06/01/2024".into()),
            ..Default::default()
        };
        let mut audit = AuditTrail::new();
        resolve_dates(&mut literal, &pages, &mut audit);
        assert_eq!(
            literal.closing.unwrap().close_of_escrow_date.as_deref(),
            Some("2024-06-01")
        );

        let mut day_count = TermSet {
            closing_date: Some("45".into()),
            ..Default::default()
        };
        let mut audit = AuditTrail::new();
        resolve_dates(&mut day_count, &pages, &mut audit);
        assert_eq!(
            day_count.closing.unwrap().close_of_escrow_date.as_deref(),
            Some("2024-04-29")
        );
    }

    #[test]
    fn unresolvable_closing_logged() {
        let mut terms = TermSet::default();
        let mut audit = AuditTrail::new();
        resolve_dates(&mut terms, &[], &mut audit);
        assert!(terms.closing.is_none());
        assert!(audit.mentions(Stage::Temporal, "closing date unresolved"));
    }

    #[test]
    fn contingency_deadlines_from_offsets() {
        let pages = vec![page_with_dates(1, &["03/15/2024"], &[])];
        let mut terms = TermSet {
            contingencies: Some(Contingencies {
                inspection: Some(Contingency {
                    days_after_acceptance: Some(17),
                    ..Default::default()
                }),
                appraisal: Some(Contingency {
                    specific_date: Some("04/05/2024".into()),
                    ..Default::default()
                }),
                loan: Some(Contingency {
                    waived: Some(true),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut audit = AuditTrail::new();
        resolve_dates(&mut terms, &pages, &mut audit);

        let c = terms.contingencies.unwrap();
        assert_eq!(
            c.inspection.unwrap().calculated_deadline.as_deref(),
            Some("2024-04-01")
        );
        assert_eq!(
            c.appraisal.unwrap().calculated_deadline.as_deref(),
            Some("2024-04-05")
        );
        assert!(c.loan.unwrap().calculated_deadline.is_none());
    }
}
