//! Core data model for contract packets and extracted terms.
//!
//! `Page` is the only externally supplied entity; everything else is derived
//! during a single extraction run and discarded when the run returns. All
//! model-facing JSON uses camelCase keys; any term field may be `null`,
//! meaning "not visible on this page". Absence is never evidence of falsity.

use serde::{Deserialize, Serialize};

use crate::role::{ContentCategory, PageRole};

/// Raw image encoding of a scanned page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Png,
    Jpeg,
}

impl MediaType {
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

/// One scanned page of the packet. Page numbers are 1-based and contiguous.
#[derive(Debug, Clone)]
pub struct Page {
    pub page_number: u32,
    pub image: Vec<u8>,
    pub media_type: MediaType,
}

impl Page {
    pub fn new(page_number: u32, image: Vec<u8>, media_type: MediaType) -> Self {
        Self {
            page_number,
            image,
            media_type,
        }
    }
}

/// Classifier verdict for a single page. `None` at the array level means the
/// model detected no form on the page at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageClassification {
    /// Absolute 1-based page number within the packet.
    pub pdf_page: u32,
    /// Form identifier, e.g. `"RPA-CA"`, `"TREC 20-17"`, `"SCO"`.
    pub form_code: String,
    #[serde(default)]
    pub form_revision: Option<String>,
    /// Page number printed on the form itself ("Page 3 of 16").
    #[serde(default)]
    pub form_page: Option<u32>,
    #[serde(default)]
    pub total_pages_in_form: Option<u32>,
    pub role: PageRole,
    pub content_category: ContentCategory,
    #[serde(default)]
    pub has_filled_fields: bool,
    /// Classifier self-reported confidence, 0-100.
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub title_snippet: Option<String>,
    #[serde(default)]
    pub footer_text: Option<String>,
}

/// A page selected for extraction, with its human-readable provenance label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalPage {
    pub page_number: u32,
    pub label: String,
}

// ============================================================================
// Term sub-objects
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarnestMoneyDeposit {
    #[serde(default)]
    pub amount: Option<f64>,
    /// Who holds the deposit (escrow company, title company, brokerage).
    #[serde(default)]
    pub holder: Option<String>,
    #[serde(default)]
    pub due_within_days: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Financing {
    #[serde(default)]
    pub loan_type: Option<String>,
    #[serde(default)]
    pub loan_amount: Option<f64>,
    #[serde(default)]
    pub down_payment: Option<f64>,
    #[serde(default)]
    pub interest_rate: Option<f64>,
    #[serde(default)]
    pub cash_offer: Option<bool>,
    #[serde(default)]
    pub lender: Option<String>,
}

/// One contingency clause. `calculated_deadline` is filled during temporal
/// resolution, never taken from the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contingency {
    #[serde(default)]
    pub waived: Option<bool>,
    #[serde(default)]
    pub days_after_acceptance: Option<i64>,
    #[serde(default)]
    pub specific_date: Option<String>,
    #[serde(default)]
    pub calculated_deadline: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contingencies {
    #[serde(default)]
    pub inspection: Option<Contingency>,
    #[serde(default)]
    pub appraisal: Option<Contingency>,
    #[serde(default)]
    pub loan: Option<Contingency>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Closing {
    /// Explicit calendar date; wins over any day-offset when present.
    #[serde(default)]
    pub close_of_escrow_date: Option<String>,
    #[serde(default)]
    pub days_after_acceptance: Option<i64>,
    #[serde(default)]
    pub possession: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosingCosts {
    #[serde(default)]
    pub escrow_fee_paid_by: Option<String>,
    #[serde(default)]
    pub title_policy_paid_by: Option<String>,
    #[serde(default)]
    pub transfer_tax_paid_by: Option<String>,
    #[serde(default)]
    pub home_warranty_paid_by: Option<String>,
    #[serde(default)]
    pub home_warranty_amount: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brokers {
    #[serde(default)]
    pub listing_brokerage: Option<String>,
    #[serde(default)]
    pub listing_agent: Option<String>,
    #[serde(default)]
    pub listing_agent_phone: Option<String>,
    #[serde(default)]
    pub listing_agent_email: Option<String>,
    #[serde(default)]
    pub listing_license: Option<String>,
    #[serde(default)]
    pub selling_brokerage: Option<String>,
    #[serde(default)]
    pub selling_agent: Option<String>,
    #[serde(default)]
    pub selling_agent_phone: Option<String>,
    #[serde(default)]
    pub selling_agent_email: Option<String>,
    #[serde(default)]
    pub selling_license: Option<String>,
}

fn present(s: &Option<String>) -> bool {
    s.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Completeness scoring and null-backfill for the "most complete object
/// wins" merge strategy. The count is an unweighted populated-sub-field
/// tally; see DESIGN.md for why it stays unweighted.
pub trait Completeness {
    fn filled_count(&self) -> usize;

    /// Fill sub-fields that are still null from `other`. Populated values
    /// are never overwritten. Returns true if anything changed.
    fn backfill_from(&mut self, other: &Self) -> bool;
}

macro_rules! backfill {
    ($changed:ident, $self_:ident, $other:ident, $($field:ident),+ $(,)?) => {
        $(
            if $self_.$field.is_none() && $other.$field.is_some() {
                $self_.$field = $other.$field.clone();
                $changed = true;
            }
        )+
    };
}

impl Completeness for EarnestMoneyDeposit {
    fn filled_count(&self) -> usize {
        self.amount.is_some() as usize
            + present(&self.holder) as usize
            + self.due_within_days.is_some() as usize
    }

    fn backfill_from(&mut self, other: &Self) -> bool {
        let mut changed = false;
        backfill!(changed, self, other, amount, holder, due_within_days);
        changed
    }
}

impl Completeness for Financing {
    fn filled_count(&self) -> usize {
        present(&self.loan_type) as usize
            + self.loan_amount.is_some() as usize
            + self.down_payment.is_some() as usize
            + self.interest_rate.is_some() as usize
            + self.cash_offer.is_some() as usize
            + present(&self.lender) as usize
    }

    fn backfill_from(&mut self, other: &Self) -> bool {
        let mut changed = false;
        backfill!(
            changed, self, other, loan_type, loan_amount, down_payment, interest_rate, cash_offer,
            lender,
        );
        changed
    }
}

impl Completeness for Closing {
    fn filled_count(&self) -> usize {
        present(&self.close_of_escrow_date) as usize
            + self.days_after_acceptance.is_some() as usize
            + present(&self.possession) as usize
    }

    fn backfill_from(&mut self, other: &Self) -> bool {
        let mut changed = false;
        backfill!(
            changed,
            self,
            other,
            close_of_escrow_date,
            days_after_acceptance,
            possession,
        );
        changed
    }
}

impl Completeness for ClosingCosts {
    fn filled_count(&self) -> usize {
        present(&self.escrow_fee_paid_by) as usize
            + present(&self.title_policy_paid_by) as usize
            + present(&self.transfer_tax_paid_by) as usize
            + present(&self.home_warranty_paid_by) as usize
            + self.home_warranty_amount.is_some() as usize
    }

    fn backfill_from(&mut self, other: &Self) -> bool {
        let mut changed = false;
        backfill!(
            changed,
            self,
            other,
            escrow_fee_paid_by,
            title_policy_paid_by,
            transfer_tax_paid_by,
            home_warranty_paid_by,
            home_warranty_amount,
        );
        changed
    }
}

impl Completeness for Brokers {
    fn filled_count(&self) -> usize {
        [
            &self.listing_brokerage,
            &self.listing_agent,
            &self.listing_agent_phone,
            &self.listing_agent_email,
            &self.listing_license,
            &self.selling_brokerage,
            &self.selling_agent,
            &self.selling_agent_phone,
            &self.selling_agent_email,
            &self.selling_license,
        ]
        .iter()
        .filter(|s| present(s))
        .count()
    }

    fn backfill_from(&mut self, other: &Self) -> bool {
        let mut changed = false;
        backfill!(
            changed,
            self,
            other,
            listing_brokerage,
            listing_agent,
            listing_agent_phone,
            listing_agent_email,
            listing_license,
            selling_brokerage,
            selling_agent,
            selling_agent_phone,
            selling_agent_email,
            selling_license,
        );
        changed
    }
}

impl Contingency {
    /// First-writer-wins fill of leaf sub-fields. Returns true if any leaf
    /// was filled.
    pub fn fill_missing_from(&mut self, other: &Self) -> bool {
        let mut changed = false;
        backfill!(
            changed,
            self,
            other,
            waived,
            days_after_acceptance,
            specific_date,
        );
        changed
    }
}

impl Contingencies {
    pub fn fill_missing_from(&mut self, other: &Self) -> bool {
        let mut changed = false;
        for (slot, incoming) in [
            (&mut self.inspection, &other.inspection),
            (&mut self.appraisal, &other.appraisal),
            (&mut self.loan, &other.loan),
        ] {
            match (slot.as_mut(), incoming) {
                (Some(existing), Some(new)) => changed |= existing.fill_missing_from(new),
                (None, Some(new)) => {
                    *slot = Some(new.clone());
                    changed = true;
                }
                _ => {}
            }
        }
        changed
    }
}

// ============================================================================
// Per-page extraction record and the reconciled term set
// ============================================================================

/// Structured data extracted from one critical page, independent of any
/// cross-page context. `page_number`, `page_label` and `page_role` are
/// mandatory in the wire format; everything else is sparse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageTerms {
    pub page_number: u32,
    pub page_label: String,
    #[serde(default)]
    pub form_code: Option<String>,
    #[serde(default)]
    pub form_page: Option<u32>,
    pub page_role: PageRole,
    #[serde(default)]
    pub confidence: Option<f32>,

    #[serde(default)]
    pub buyer_names: Option<Vec<String>>,
    #[serde(default)]
    pub seller_names: Option<Vec<String>>,
    #[serde(default)]
    pub property_address: Option<String>,
    #[serde(default)]
    pub purchase_price: Option<f64>,
    #[serde(default)]
    pub earnest_money_deposit: Option<EarnestMoneyDeposit>,
    #[serde(default)]
    pub financing: Option<Financing>,
    #[serde(default)]
    pub contingencies: Option<Contingencies>,
    #[serde(default)]
    pub closing: Option<Closing>,
    #[serde(default)]
    pub closing_costs: Option<ClosingCosts>,
    #[serde(default)]
    pub brokers: Option<Brokers>,
    #[serde(default)]
    pub personal_property_included: Option<Vec<String>>,
    #[serde(default)]
    pub additional_terms: Option<Vec<String>>,
    #[serde(default)]
    pub buyer_signature_dates: Option<Vec<String>>,
    #[serde(default)]
    pub seller_signature_dates: Option<Vec<String>>,
    /// Legacy flat field: either a literal date or a bare day count.
    #[serde(default)]
    pub closing_date: Option<String>,
}

/// The reconciled, authoritative term set for the transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermSet {
    #[serde(default)]
    pub buyer_names: Option<Vec<String>>,
    #[serde(default)]
    pub seller_names: Option<Vec<String>>,
    #[serde(default)]
    pub property_address: Option<String>,
    #[serde(default)]
    pub purchase_price: Option<f64>,
    #[serde(default)]
    pub earnest_money_deposit: Option<EarnestMoneyDeposit>,
    #[serde(default)]
    pub financing: Option<Financing>,
    #[serde(default)]
    pub contingencies: Option<Contingencies>,
    #[serde(default)]
    pub closing: Option<Closing>,
    #[serde(default)]
    pub closing_costs: Option<ClosingCosts>,
    #[serde(default)]
    pub brokers: Option<Brokers>,
    #[serde(default)]
    pub personal_property_included: Option<Vec<String>>,
    #[serde(default)]
    pub additional_terms: Option<Vec<String>>,
    #[serde(default)]
    pub buyer_signature_dates: Option<Vec<String>>,
    #[serde(default)]
    pub seller_signature_dates: Option<Vec<String>>,
    #[serde(default)]
    pub closing_date: Option<String>,
    /// Acceptance date: latest signature date across all parties and pages.
    /// Filled by temporal resolution.
    #[serde(default)]
    pub effective_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_page_terms_deserialize() {
        let json = r#"{
            "pageNumber": 3,
            "pageLabel": "RPA-CA PAGE 1 – TRANSACTION TERMS (FILLED)",
            "formCode": "RPA-CA",
            "pageRole": "main_contract",
            "purchasePrice": 500000.0
        }"#;
        let terms: PageTerms = serde_json::from_str(json).unwrap();
        assert_eq!(terms.page_number, 3);
        assert_eq!(terms.purchase_price, Some(500000.0));
        assert!(terms.buyer_names.is_none());
        assert!(terms.contingencies.is_none());
    }

    #[test]
    fn brokers_completeness_counts_nonempty_only() {
        let mut b = Brokers::default();
        assert_eq!(b.filled_count(), 0);
        b.listing_agent = Some("Jo Lin".into());
        b.selling_agent = Some("   ".into()); // whitespace is not populated
        assert_eq!(b.filled_count(), 1);
    }

    #[test]
    fn backfill_never_overwrites() {
        let mut acc = Financing {
            loan_type: Some("conventional".into()),
            ..Default::default()
        };
        let candidate = Financing {
            loan_type: Some("FHA".into()),
            loan_amount: Some(400000.0),
            ..Default::default()
        };
        let changed = acc.backfill_from(&candidate);
        assert!(changed);
        assert_eq!(acc.loan_type.as_deref(), Some("conventional"));
        assert_eq!(acc.loan_amount, Some(400000.0));
    }

    #[test]
    fn contingency_fill_is_first_writer_wins() {
        let mut acc = Contingencies {
            inspection: Some(Contingency {
                days_after_acceptance: Some(10),
                ..Default::default()
            }),
            ..Default::default()
        };
        let later = Contingencies {
            inspection: Some(Contingency {
                days_after_acceptance: Some(17),
                waived: Some(false),
                ..Default::default()
            }),
            appraisal: Some(Contingency {
                waived: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        acc.fill_missing_from(&later);

        let inspection = acc.inspection.unwrap();
        assert_eq!(inspection.days_after_acceptance, Some(10), "already set");
        assert_eq!(inspection.waived, Some(false), "null leaf was filled");
        assert_eq!(acc.appraisal.unwrap().waived, Some(true));
    }
}
