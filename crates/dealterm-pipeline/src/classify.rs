//! Batch page classification with fan-out concurrency.
//!
//! Pages are split into contiguous fixed-size batches, one model call per
//! batch, all batches in flight at once. Batches settle independently: a
//! failed batch leaves its pages unclassified and the run continues with the
//! survivors. Only a total wipeout is fatal.

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use dealterm_core::model::{Page, PageClassification};
use dealterm_llm::{recover_object, ImagePart, PromptTemplates, VisionModel, VisionRequest};

use crate::error::{BatchFailure, PipelineError};

/// Pages per classification call. Large packets fan out in parallel batches
/// of this size.
pub const CLASSIFY_BATCH_SIZE: usize = 15;

pub(crate) fn image_parts(pages: &[Page]) -> Vec<ImagePart> {
    pages
        .iter()
        .map(|p| ImagePart {
            bytes: p.image.clone(),
            mime: p.media_type.mime(),
        })
        .collect()
}

/// Classify every page of the packet. Returns one entry per page, indexed by
/// absolute page number; `None` marks no-form pages and pages from failed
/// batches alike.
pub async fn classify_pages(
    model: Arc<dyn VisionModel>,
    pages: &[Page],
) -> Result<Vec<Option<PageClassification>>, PipelineError> {
    let total = pages.len();
    let batch_count = total.div_ceil(CLASSIFY_BATCH_SIZE);
    if total == 0 {
        return Err(PipelineError::NoUsableContent { batches: 0 });
    }

    let mut tasks: JoinSet<(usize, Result<Vec<Option<PageClassification>>, BatchFailure>)> =
        JoinSet::new();

    for (batch_idx, chunk) in pages.chunks(CLASSIFY_BATCH_SIZE).enumerate() {
        let model = Arc::clone(&model);
        let images = image_parts(chunk);
        let batch_len = chunk.len();
        let start_page = (batch_idx * CLASSIFY_BATCH_SIZE) as u32 + 1;

        // Each task owns its slice's images and returns an immutable result;
        // there is no shared mutable state across batches.
        tasks.spawn(async move {
            let request = VisionRequest {
                instruction: PromptTemplates::classify_batch(batch_len, start_page),
                images,
                max_tokens: Some(8192),
                temperature: Some(0.0),
            };
            (batch_idx, classify_batch(model.as_ref(), request, batch_len).await)
        });
    }

    // Settle all, filter survivors. No fail-fast: one bad batch must not
    // poison the rest.
    let mut slots: Vec<Option<PageClassification>> = vec![None; total];
    let mut surviving = 0usize;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((batch_idx, Ok(entries))) => {
                surviving += 1;
                place_batch(&mut slots, batch_idx, entries);
            }
            Ok((batch_idx, Err(failure))) => {
                warn!(batch = batch_idx, %failure, "classification batch failed; continuing without it");
            }
            Err(join_error) => {
                warn!(%join_error, "classification task aborted");
            }
        }
    }

    if surviving == 0 {
        return Err(PipelineError::NoUsableContent {
            batches: batch_count,
        });
    }

    info!(
        batches = batch_count,
        surviving,
        classified = slots.iter().filter(|s| s.is_some()).count(),
        "classification complete"
    );
    Ok(slots)
}

/// Write one batch's entries into the absolute-page slots, correcting any
/// page number the model misreported: position is trusted over the model's
/// own index.
fn place_batch(
    slots: &mut [Option<PageClassification>],
    batch_idx: usize,
    entries: Vec<Option<PageClassification>>,
) {
    let base = batch_idx * CLASSIFY_BATCH_SIZE;
    for (offset, entry) in entries.into_iter().enumerate() {
        let expected = (base + offset) as u32 + 1;
        slots[base + offset] = entry.map(|mut cls| {
            if cls.pdf_page != expected {
                warn!(
                    reported = cls.pdf_page,
                    expected, "classifier misreported a page number; trusting position"
                );
                cls.pdf_page = expected;
            }
            cls
        });
    }
}

async fn classify_batch(
    model: &dyn VisionModel,
    request: VisionRequest,
    batch_len: usize,
) -> Result<Vec<Option<PageClassification>>, BatchFailure> {
    let response = model.complete(request).await?;
    parse_batch_response(&response.content, batch_len)
}

pub(crate) fn parse_batch_response(
    content: &str,
    batch_len: usize,
) -> Result<Vec<Option<PageClassification>>, BatchFailure> {
    let value = recover_object(content)?;
    let pages = value
        .get("pages")
        .and_then(Value::as_array)
        .ok_or_else(|| BatchFailure::WrongShape("missing \"pages\" array".to_string()))?;

    if pages.len() != batch_len {
        return Err(BatchFailure::WrongShape(format!(
            "expected {batch_len} entries, got {}",
            pages.len()
        )));
    }

    let entries = pages
        .iter()
        .map(|entry| {
            if entry.is_null() {
                return None;
            }
            match serde_json::from_value::<PageClassification>(entry.clone()) {
                Ok(cls) => Some(cls),
                Err(err) => {
                    // One bad entry degrades to "no form detected" rather
                    // than sinking its whole batch.
                    debug!(%err, "dropping undecodable classification entry");
                    None
                }
            }
        })
        .collect();

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;
    use dealterm_core::model::MediaType;

    fn packet(n: usize) -> Vec<Page> {
        (1..=n as u32)
            .map(|i| Page::new(i, vec![0u8; 16], MediaType::Png))
            .collect()
    }

    fn cls_json(pdf_page: u32) -> String {
        format!(
            r#"{{"pdfPage": {pdf_page}, "formCode": "RPA-CA", "role": "main_contract",
               "contentCategory": "transaction_terms", "hasFilledFields": true, "confidence": 92}}"#
        )
    }

    fn batch_response(pages: &[Option<u32>]) -> String {
        let entries: Vec<String> = pages
            .iter()
            .map(|p| p.map(cls_json).unwrap_or_else(|| "null".to_string()))
            .collect();
        format!(r#"{{"pages": [{}]}}"#, entries.join(","))
    }

    #[tokio::test]
    async fn single_batch_classifies_in_order() {
        let model = Arc::new(ScriptedModel::sequence(vec![Ok(batch_response(&[
            Some(1),
            None,
            Some(3),
        ]))]));
        let pages = packet(3);
        let result = classify_pages(model, &pages).await.unwrap();

        assert_eq!(result.len(), 3);
        assert!(result[0].is_some());
        assert!(result[1].is_none());
        assert_eq!(result[2].as_ref().unwrap().pdf_page, 3);
    }

    #[tokio::test]
    async fn misreported_page_numbers_are_corrected_in_place() {
        let model = Arc::new(ScriptedModel::sequence(vec![Ok(batch_response(&[
            Some(7),
            Some(9),
        ]))]));
        let pages = packet(2);
        let result = classify_pages(model, &pages).await.unwrap();

        assert_eq!(result[0].as_ref().unwrap().pdf_page, 1);
        assert_eq!(result[1].as_ref().unwrap().pdf_page, 2);
    }

    #[tokio::test]
    async fn failed_batch_is_isolated() {
        // 17 pages → two batches. The second (pages 16..17) succeeds while
        // the first returns garbage.
        let model = Arc::new(ScriptedModel::with_rules(vec![
            (
                "packet page 1;",
                Ok("the dog ate my classification".to_string()),
            ),
            ("packet page 16;", Ok(batch_response(&[Some(16), Some(17)]))),
        ]));
        let pages = packet(17);
        let result = classify_pages(model, &pages).await.unwrap();

        assert!(result[..15].iter().all(Option::is_none));
        assert!(result[15].is_some());
        assert!(result[16].is_some());
    }

    #[tokio::test]
    async fn all_batches_failing_is_fatal() {
        let model = Arc::new(ScriptedModel::sequence(vec![Ok("nope".to_string())]));
        let pages = packet(2);
        let err = classify_pages(model, &pages).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoUsableContent { batches: 1 }));
    }

    #[test]
    fn wrong_length_batch_is_a_shape_failure() {
        let response = batch_response(&[Some(1)]);
        let err = parse_batch_response(&response, 2).unwrap_err();
        assert!(matches!(err, BatchFailure::WrongShape(_)));
    }

    #[test]
    fn undecodable_entry_degrades_to_none() {
        let response = r#"{"pages": [{"pdfPage": "not a number"}, null]}"#;
        let entries = parse_batch_response(response, 2).unwrap();
        assert!(entries[0].is_none());
        assert!(entries[1].is_none());
    }
}
