//! The extraction pipeline entry point.
//!
//! pages → classify → select → extract → merge → temporal → coerce/validate
//! → (second turn if errors) → re-merge → re-validate → final term set.
//!
//! A run either returns an outcome (possibly flagged for review) or fails
//! with a single fatal error when no usable content could be classified or
//! extracted at all. Dropping the returned future cancels in-flight batch
//! calls with it.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use dealterm_core::audit::{AuditTrail, Stage};
use dealterm_core::dates::resolve_dates;
use dealterm_core::merge::{merge_page_terms, MergeOutcome};
use dealterm_core::model::{CriticalPage, Page, PageClassification, PageTerms, TermSet};
use dealterm_core::select::select_critical_pages;
use dealterm_core::validate::{validate_terms, ValidationReport};
use dealterm_llm::{ConfigError, PromptTemplates, UnifiedVision, VisionModel};

use crate::classify::classify_pages;
use crate::error::PipelineError;
use crate::extract::extract_page_terms;
use crate::second_turn::{problem_fields, run_second_turn, splice_records};

/// Retry depth for validator-triggered re-extraction. Deliberately a
/// constant: widening it is a design decision, not a tuning knob.
pub const MAX_SECOND_TURNS: usize = 1;

/// Everything a caller might want to inspect about a run, beyond the final
/// terms themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionDetails {
    pub classifications: Vec<Option<PageClassification>>,
    pub critical_pages: Vec<CriticalPage>,
    pub page_extractions: Vec<PageTerms>,
    /// field → packet page that supplied its final value.
    pub provenance: BTreeMap<String, u32>,
    pub audit: AuditTrail,
    pub validation: ValidationReport,
    pub second_turn_used: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionOutcome {
    pub run_id: Uuid,
    pub final_terms: TermSet,
    pub needs_review: bool,
    pub details: ExtractionDetails,
}

/// The contract extraction pipeline. Holds nothing but the model handle;
/// every run is self-contained and caches nothing across runs.
pub struct Pipeline {
    model: Arc<dyn VisionModel>,
}

impl Pipeline {
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self { model }
    }

    /// Build against the provider configured in the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(Arc::new(UnifiedVision::from_env()?)))
    }

    /// Run the full pipeline over an ordered packet of page images.
    pub async fn extract(&self, pages: &[Page]) -> Result<ExtractionOutcome, PipelineError> {
        let run_id = Uuid::new_v4();
        let mut audit = AuditTrail::new();
        info!(%run_id, pages = pages.len(), model = %self.model.model_name(), "starting extraction run");

        let classifications = classify_pages(Arc::clone(&self.model), pages).await?;
        audit.record(
            Stage::Classify,
            format!(
                "{} of {} pages classified",
                classifications.iter().filter(|c| c.is_some()).count(),
                pages.len()
            ),
        );

        let critical = select_critical_pages(&classifications, &[]);
        if critical.is_empty() {
            return Err(PipelineError::NoCriticalPages {
                total_pages: pages.len(),
            });
        }
        audit.record(
            Stage::Select,
            format!(
                "{} of {} pages selected for extraction",
                critical.len(),
                pages.len()
            ),
        );

        let labels: Vec<String> = critical.iter().map(|c| c.label.clone()).collect();
        let mut records = extract_page_terms(
            self.model.as_ref(),
            pages,
            &critical,
            PromptTemplates::extract_pages(&labels),
            &mut audit,
        )
        .await?;

        let (mut merged, mut report) = merge_resolve_validate(&records, &mut audit);

        let mut second_turn_used = false;
        for _ in 0..MAX_SECOND_TURNS {
            if !report.needs_second_turn {
                break;
            }
            let problems = problem_fields(&report.errors);
            match run_second_turn(
                self.model.as_ref(),
                pages,
                &critical,
                &merged.terms,
                &problems,
                &mut audit,
            )
            .await
            {
                Ok(second) => {
                    second_turn_used = true;
                    records = splice_records(&records, second);
                    let (m, r) = merge_resolve_validate(&records, &mut audit);
                    merged = m;
                    report = r;
                }
                Err(err) => {
                    // A retry failure degrades to "needs human review",
                    // never to "no result".
                    warn!(%err, "second turn failed; keeping first-turn result");
                    audit.record(
                        Stage::SecondTurn,
                        format!("second turn failed ({err}); keeping first-turn result"),
                    );
                    break;
                }
            }
        }

        info!(
            %run_id,
            needs_review = report.needs_review,
            second_turn_used,
            "extraction run finished"
        );
        Ok(ExtractionOutcome {
            run_id,
            needs_review: report.needs_review,
            final_terms: merged.terms,
            details: ExtractionDetails {
                classifications,
                critical_pages: critical,
                page_extractions: records,
                provenance: merged.provenance,
                audit,
                validation: report,
                second_turn_used,
            },
        })
    }
}

/// Merge, resolve dates, validate: the deterministic tail of a pass, run
/// identically for the first turn and after a second-turn splice.
fn merge_resolve_validate(
    records: &[PageTerms],
    audit: &mut AuditTrail,
) -> (MergeOutcome, ValidationReport) {
    let mut outcome = merge_page_terms(records, audit);
    resolve_dates(&mut outcome.terms, records, audit);
    let report = validate_terms(&outcome.terms, audit);
    (outcome, report)
}
