//! Prompt templates for classification and extraction.
//!
//! Each template spells out the exact JSON the pipeline expects back; the
//! defensive parser still assumes none of it is guaranteed.

/// Builders for the instructions sent with page images.
pub struct PromptTemplates;

impl PromptTemplates {
    /// Instruction for classifying one batch of page images.
    ///
    /// `start_page` is the absolute 1-based number of the first image in the
    /// batch; the model must label pages with absolute numbers.
    pub fn classify_batch(batch_len: usize, start_page: u32) -> String {
        format!(
            r#"You are reviewing {batch_len} scanned pages of a residential real-estate purchase contract packet. The first image is packet page {start_page}; the images are consecutive.

For EACH image, in order, classify the page. Return ONE JSON object of the form:

{{
  "pages": [
    {{
      "pdfPage": <absolute packet page number>,
      "formCode": "<form identifier, e.g. RPA-CA, SCO, TREC 20-17>",
      "formRevision": "<printed revision, or null>",
      "formPage": <page number printed on the form itself, or null>,
      "totalPagesInForm": <total pages of that form, or null>,
      "role": "<one of: main_contract, counter_offer, addendum, local_addendum, contingency_release, disclosure, financing, broker_info, title_page, other>",
      "contentCategory": "<one of: transaction_terms, signatures, broker_info, disclosures, boilerplate, other>",
      "hasFilledFields": <true if anything is handwritten, typed in, checked, or signed>,
      "confidence": <0-100>,
      "titleSnippet": "<first prominent heading, or null>",
      "footerText": "<form footer text, or null>"
    }}
  ]
}}

Rules:
- "pages" MUST contain exactly {batch_len} entries, one per image, in input order.
- Use null (not an object) for a page that is not part of any form (photos, blank pages, fax covers).
- pdfPage counts from {start_page} for the first image and increases by one per image.
- Do not include any text outside the JSON object."#
        )
    }

    /// Instruction for extracting structured terms from the critical pages.
    pub fn extract_pages(labels: &[String]) -> String {
        let page_list = labels
            .iter()
            .enumerate()
            .map(|(i, label)| format!("{}. {label}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"You are extracting transaction terms from selected pages of a real-estate purchase contract packet. The images are, in order:

{page_list}

Return ONE JSON array with exactly one object per image, in input order. Each object describes ONLY what is visible on that single page; do not carry information between pages. Use null for anything not visible on the page, and never guess.

Each object has this shape (all keys camelCase, every term field nullable):

{{
  "pageNumber": <packet page number from the list above>,
  "pageLabel": "<the label from the list above>",
  "formCode": "<form identifier>",
  "formPage": <form-internal page number or null>,
  "pageRole": "<main_contract | counter_offer | addendum | local_addendum | contingency_release | broker_info | other>",
  "confidence": <0-100>,
  "buyerNames": ["..."] ,
  "sellerNames": ["..."],
  "propertyAddress": "...",
  "purchasePrice": <number>,
  "earnestMoneyDeposit": {{"amount": <number>, "holder": "...", "dueWithinDays": <number>}},
  "financing": {{"loanType": "...", "loanAmount": <number>, "downPayment": <number>, "interestRate": <number>, "cashOffer": <bool>, "lender": "..."}},
  "contingencies": {{
    "inspection": {{"waived": <bool>, "daysAfterAcceptance": <number>, "specificDate": "..."}},
    "appraisal": {{"waived": <bool>, "daysAfterAcceptance": <number>, "specificDate": "..."}},
    "loan": {{"waived": <bool>, "daysAfterAcceptance": <number>, "specificDate": "..."}}
  }},
  "closing": {{"closeOfEscrowDate": "...", "daysAfterAcceptance": <number>, "possession": "..."}},
  "closingCosts": {{"escrowFeePaidBy": "...", "titlePolicyPaidBy": "...", "transferTaxPaidBy": "...", "homeWarrantyPaidBy": "...", "homeWarrantyAmount": <number>}},
  "brokers": {{"listingBrokerage": "...", "listingAgent": "...", "listingAgentPhone": "...", "listingAgentEmail": "...", "listingLicense": "...", "sellingBrokerage": "...", "sellingAgent": "...", "sellingAgentPhone": "...", "sellingAgentEmail": "...", "sellingLicense": "..."}},
  "personalPropertyIncluded": ["..."],
  "additionalTerms": ["..."],
  "buyerSignatureDates": ["M/D/YYYY", "..."],
  "sellerSignatureDates": ["M/D/YYYY", "..."],
  "closingDate": "<legacy: literal date or day count, only if printed as such>"
}}

Transcribe dates exactly as written. Record every signature date you can see, including initials-only date lines. Do not include any text outside the JSON array."#
        )
    }

    /// Instruction for the targeted second-turn re-extraction.
    pub fn second_turn(
        first_turn_json: &str,
        problem_fields: &[String],
        labels: &[String],
    ) -> String {
        let fields = problem_fields.join(", ");
        let base = Self::extract_pages(labels);
        format!(
            r#"{base}

SECOND PASS. A previous extraction of these same pages produced the merged result below. It failed validation for these fields: {fields}.

Previous merged result (FOR CONTEXT ONLY, do not copy it blindly; re-read the page images, especially for the failed fields):

{first_turn_json}

Pay particular attention to the failed fields on every page. If a value genuinely is not on a page, keep it null."#
        )
    }
}
