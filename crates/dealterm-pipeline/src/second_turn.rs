//! Second-turn targeted re-extraction.
//!
//! Triggered only by validation errors. The retry scopes the model's
//! attention to the fields that failed, embeds the first-turn merged result
//! as explicitly non-authoritative context, and re-reads the same critical
//! pages. Results are spliced into the first-turn records by page number and
//! the whole set is re-merged from scratch.

use tracing::info;

use dealterm_core::audit::{AuditTrail, Stage};
use dealterm_core::model::{CriticalPage, Page, PageTerms, TermSet};
use dealterm_llm::{PromptTemplates, VisionModel};

use crate::error::PipelineError;
use crate::extract::extract_page_terms;

/// Validator error text → the field the model should re-read. Substring
/// match over lowercased error strings.
const FIELD_HINTS: &[(&str, &str)] = &[
    ("purchase price", "purchasePrice"),
    ("buyer", "buyerNames"),
    ("seller", "sellerNames"),
    ("address", "propertyAddress"),
    ("effective date", "effectiveDate"),
    ("signature", "buyerSignatureDates"),
];

/// Derive the problem-field list from validator error strings.
pub fn problem_fields(errors: &[String]) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    for error in errors {
        let lowered = error.to_lowercase();
        for (needle, field) in FIELD_HINTS {
            if lowered.contains(needle) && !fields.iter().any(|f| f == field) {
                fields.push((*field).to_string());
            }
        }
    }
    fields
}

/// Run the targeted re-extraction. Errors propagate to the caller, which
/// downgrades them to "keep the first-turn result".
pub async fn run_second_turn(
    model: &dyn VisionModel,
    pages: &[Page],
    critical: &[CriticalPage],
    first_turn: &TermSet,
    problems: &[String],
    audit: &mut AuditTrail,
) -> Result<Vec<PageTerms>, PipelineError> {
    let labels: Vec<String> = critical.iter().map(|c| c.label.clone()).collect();
    let context = serde_json::to_string_pretty(first_turn)
        .map_err(|e| PipelineError::MalformedExtraction(e.to_string()))?;
    let instruction = PromptTemplates::second_turn(&context, problems, &labels);

    info!(fields = ?problems, "running second-turn extraction");
    audit.record(
        Stage::SecondTurn,
        format!("re-extracting fields: {}", problems.join(", ")),
    );
    extract_page_terms(model, pages, critical, instruction, audit).await
}

/// Splice second-turn records into the first-turn set: a second-turn record
/// replaces the first-turn record for the same page; unmatched pages are
/// appended.
pub fn splice_records(first: &[PageTerms], second: Vec<PageTerms>) -> Vec<PageTerms> {
    let mut merged: Vec<PageTerms> = first.to_vec();
    for record in second {
        match merged.iter_mut().find(|r| r.page_number == record.page_number) {
            Some(slot) => *slot = record,
            None => merged.push(record),
        }
    }
    merged.sort_by_key(|r| r.page_number);
    merged
}
