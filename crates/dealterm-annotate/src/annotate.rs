//! Chunked document annotation.
//!
//! Alternate backend with the same logical contract as the per-page
//! extractor, but operating on an assembled multi-page artifact instead of
//! individual images. The service imposes a page-count ceiling per call, so
//! requests are chunked and the per-chunk results concatenated.

use serde_json::Value;
use tracing::info;

use dealterm_core::audit::AuditTrail;
use dealterm_core::coerce::coerce_record;
use dealterm_core::model::PageTerms;
use dealterm_llm::recover_object;

use crate::blob::BlobRef;
use crate::error::AnnotateError;

/// Externally imposed ceiling on pages per annotation call.
pub const ANNOTATE_PAGE_LIMIT: u32 = 8;

pub struct AnnotationClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl AnnotationClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Annotate `total_pages` pages of the referenced document against the
    /// given JSON schema, one call per page range chunk.
    pub async fn annotate(
        &self,
        doc: &BlobRef,
        schema: &Value,
        total_pages: u32,
        audit: &mut AuditTrail,
    ) -> Result<Vec<PageTerms>, AnnotateError> {
        let mut records = Vec::new();
        for (start, end) in page_ranges(total_pages, ANNOTATE_PAGE_LIMIT) {
            let chunk = self.annotate_range(doc, schema, start, end).await?;
            records.extend(parse_annotation(&chunk, audit)?);
        }
        info!(total_pages, records = records.len(), "annotation complete");
        Ok(records)
    }

    async fn annotate_range(
        &self,
        doc: &BlobRef,
        schema: &Value,
        start: u32,
        end: u32,
    ) -> Result<Value, AnnotateError> {
        let url = format!("{}/annotate", self.base_url);
        let body = serde_json::json!({
            "document": doc.url,
            "schema": schema,
            "pageRange": {"start": start, "end": end},
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| AnnotateError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnnotateError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| AnnotateError::InvalidResponse(e.to_string()))
    }
}

/// JSON-schema specification sent with every annotation request. Mirrors the
/// per-page record shape the extractor prompt describes.
pub fn term_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "pages": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "pageNumber": {"type": "integer"},
                        "pageLabel": {"type": "string"},
                        "formCode": {"type": "string"},
                        "formPage": {"type": ["integer", "null"]},
                        "pageRole": {"type": "string"},
                        "confidence": {"type": ["number", "null"]},
                        "buyerNames": {"type": ["array", "null"], "items": {"type": "string"}},
                        "sellerNames": {"type": ["array", "null"], "items": {"type": "string"}},
                        "propertyAddress": {"type": ["string", "null"]},
                        "purchasePrice": {"type": ["number", "null"]},
                        "earnestMoneyDeposit": {"type": ["object", "null"]},
                        "financing": {"type": ["object", "null"]},
                        "contingencies": {"type": ["object", "null"]},
                        "closing": {"type": ["object", "null"]},
                        "closingCosts": {"type": ["object", "null"]},
                        "brokers": {"type": ["object", "null"]},
                        "personalPropertyIncluded": {"type": ["array", "null"]},
                        "additionalTerms": {"type": ["array", "null"]},
                        "buyerSignatureDates": {"type": ["array", "null"]},
                        "sellerSignatureDates": {"type": ["array", "null"]},
                        "closingDate": {"type": ["string", "null"]}
                    },
                    "required": ["pageNumber", "pageLabel", "formCode", "pageRole"]
                }
            }
        },
        "required": ["pages"]
    })
}

/// Split `1..=total` into inclusive ranges of at most `limit` pages.
pub fn page_ranges(total: u32, limit: u32) -> Vec<(u32, u32)> {
    let mut ranges = Vec::new();
    let mut start = 1;
    while start <= total {
        let end = (start + limit - 1).min(total);
        ranges.push((start, end));
        start = end + 1;
    }
    ranges
}

/// Decode one chunk response. The `annotation` field arrives as either a
/// JSON object or a string containing JSON; both must be handled, and the
/// string variant goes through the same balanced-brace recovery as model
/// output.
pub fn parse_annotation(
    response: &Value,
    audit: &mut AuditTrail,
) -> Result<Vec<PageTerms>, AnnotateError> {
    let annotation = response
        .get("annotation")
        .ok_or_else(|| AnnotateError::InvalidResponse("missing annotation field".to_string()))?;

    let parsed: Value = match annotation {
        Value::Object(_) => annotation.clone(),
        Value::String(text) => recover_object(text)
            .map_err(|e| AnnotateError::InvalidResponse(e.to_string()))?,
        other => {
            return Err(AnnotateError::InvalidResponse(format!(
                "annotation is neither object nor string: {other}"
            )))
        }
    };

    let pages = parsed
        .get("pages")
        .and_then(Value::as_array)
        .ok_or_else(|| AnnotateError::InvalidResponse("annotation has no pages array".to_string()))?;

    let mut records = Vec::with_capacity(pages.len());
    for page in pages {
        let mut raw = page.clone();
        coerce_record(&mut raw, audit);
        let record: PageTerms = serde_json::from_value(raw)
            .map_err(|e| AnnotateError::InvalidResponse(e.to_string()))?;
        records.push(record);
    }
    Ok(records)
}
