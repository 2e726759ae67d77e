//! Per-page structured extraction.
//!
//! All critical pages go out in one call so the model can infer document
//! roles across the packet, but each returned record must describe a single
//! page: the prompt forbids cross-page carry-over, and the merge engine is
//! the only place reconciliation happens.
//!
//! Unlike classification there is no partial recovery here: an extraction
//! response that cannot be fully decoded is fatal, because a half-parsed
//! record set cannot be usefully merged.

use tracing::{info, warn};

use dealterm_core::audit::{AuditTrail, Stage};
use dealterm_core::coerce::coerce_record;
use dealterm_core::model::{CriticalPage, Page, PageTerms};
use dealterm_llm::{recover_array, ImagePart, VisionModel, VisionRequest};

use crate::error::PipelineError;

/// Keys every extraction record must carry; checked on the first element as
/// a cheap schema probe before full decoding.
const MANDATORY_KEYS: [&str; 4] = ["pageNumber", "pageLabel", "formCode", "pageRole"];

/// Run one extraction call over the critical pages and decode the response.
pub async fn extract_page_terms(
    model: &dyn VisionModel,
    pages: &[Page],
    critical: &[CriticalPage],
    instruction: String,
    audit: &mut AuditTrail,
) -> Result<Vec<PageTerms>, PipelineError> {
    let images = critical_images(pages, critical);
    let request = VisionRequest {
        instruction,
        images,
        max_tokens: Some(8192),
        temperature: Some(0.0),
    };

    let response = model
        .complete(request)
        .await
        .map_err(|source| PipelineError::Model {
            stage: "extraction",
            source,
        })?;

    let records = parse_extraction_response(&response.content, audit)?;
    info!(records = records.len(), "extraction complete");
    audit.record(
        Stage::Extract,
        format!("extracted {} page records", records.len()),
    );
    Ok(records)
}

fn critical_images(pages: &[Page], critical: &[CriticalPage]) -> Vec<ImagePart> {
    critical
        .iter()
        .filter_map(|cp| {
            let page = pages.iter().find(|p| p.page_number == cp.page_number);
            if page.is_none() {
                warn!(page = cp.page_number, "critical page missing from packet");
            }
            page
        })
        .map(|p| ImagePart {
            bytes: p.image.clone(),
            mime: p.media_type.mime(),
        })
        .collect()
}

/// Decode an extraction response: recover the array, probe mandatory keys,
/// coerce each record, deserialize strictly.
pub(crate) fn parse_extraction_response(
    content: &str,
    audit: &mut AuditTrail,
) -> Result<Vec<PageTerms>, PipelineError> {
    let value =
        recover_array(content).map_err(|e| PipelineError::MalformedExtraction(e.to_string()))?;
    let items = value
        .as_array()
        .cloned()
        .unwrap_or_default();

    if items.is_empty() {
        return Err(PipelineError::MalformedExtraction(
            "empty extraction array".to_string(),
        ));
    }

    for key in MANDATORY_KEYS {
        if items[0].get(key).is_none() {
            return Err(PipelineError::MalformedExtraction(format!(
                "first record missing mandatory key {key:?}"
            )));
        }
    }

    let mut records = Vec::with_capacity(items.len());
    for mut item in items {
        coerce_record(&mut item, audit);
        let record: PageTerms = serde_json::from_value(item)
            .map_err(|e| PipelineError::MalformedExtraction(e.to_string()))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_json(page: u32, price: &str) -> String {
        format!(
            r#"{{"pageNumber": {page}, "pageLabel": "RPA-CA PAGE {page}", "formCode": "RPA-CA",
               "pageRole": "main_contract", "purchasePrice": {price}}}"#
        )
    }

    #[test]
    fn decodes_and_coerces_records() {
        let content = format!("[{}]", record_json(3, "\"$510,000\""));
        let mut audit = AuditTrail::new();
        let records = parse_extraction_response(&content, &mut audit).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].purchase_price, Some(510_000.0));
        assert!(audit.mentions(Stage::Coerce, "purchasePrice"));
    }

    #[test]
    fn empty_array_is_fatal() {
        let mut audit = AuditTrail::new();
        let err = parse_extraction_response("[]", &mut audit).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedExtraction(_)));
    }

    #[test]
    fn missing_mandatory_key_is_fatal() {
        let content = r#"[{"pageNumber": 1, "pageLabel": "L", "formCode": "RPA-CA"}]"#;
        let mut audit = AuditTrail::new();
        let err = parse_extraction_response(content, &mut audit).unwrap_err();
        match err {
            PipelineError::MalformedExtraction(msg) => assert!(msg.contains("pageRole")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn prose_wrapped_array_recovers() {
        let content = format!("Here you go:\n```json\n[{}]\n```", record_json(1, "500000"));
        let mut audit = AuditTrail::new();
        let records = parse_extraction_response(&content, &mut audit).unwrap();
        assert_eq!(records[0].page_number, 1);
    }

    #[test]
    fn non_array_response_is_fatal() {
        let mut audit = AuditTrail::new();
        let err = parse_extraction_response("no json here at all", &mut audit).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedExtraction(_)));
    }
}
