//! Merge engine: reconcile per-page extractions into one term set.
//!
//! Records are grouped by role and processed in fixed priority order
//! (main contract → counter offer → addenda → broker info), pages ascending
//! within a role. Later, more specific documents override earlier, more
//! general ones, but only for fields they actually mention, and only for
//! fields their role is allow-listed to set. Every assignment is recorded in
//! a provenance map (field → source page) and narrated to the audit trail.

use std::collections::BTreeMap;

use crate::audit::{AuditTrail, Stage};
use crate::model::{Completeness, Contingencies, PageTerms, TermSet};
use crate::role::PageRole;

/// Canonical field names, as they appear in the wire format and in
/// provenance maps.
pub mod field {
    pub const BUYER_NAMES: &str = "buyerNames";
    pub const SELLER_NAMES: &str = "sellerNames";
    pub const PROPERTY_ADDRESS: &str = "propertyAddress";
    pub const PURCHASE_PRICE: &str = "purchasePrice";
    pub const EARNEST_MONEY_DEPOSIT: &str = "earnestMoneyDeposit";
    pub const FINANCING: &str = "financing";
    pub const CONTINGENCIES: &str = "contingencies";
    pub const CLOSING: &str = "closing";
    pub const CLOSING_COSTS: &str = "closingCosts";
    pub const BROKERS: &str = "brokers";
    pub const PERSONAL_PROPERTY_INCLUDED: &str = "personalPropertyIncluded";
    pub const ADDITIONAL_TERMS: &str = "additionalTerms";
    pub const BUYER_SIGNATURE_DATES: &str = "buyerSignatureDates";
    pub const SELLER_SIGNATURE_DATES: &str = "sellerSignatureDates";
    pub const CLOSING_DATE: &str = "closingDate";
    pub const EFFECTIVE_DATE: &str = "effectiveDate";
}

const TERM_SETTERS: &[PageRole] = &[PageRole::MainContract, PageRole::CounterOffer];

const AMENDABLE: &[PageRole] = &[
    PageRole::MainContract,
    PageRole::CounterOffer,
    PageRole::Addendum,
    PageRole::LocalAddendum,
];

const CONTINGENCY_SETTERS: &[PageRole] = &[
    PageRole::MainContract,
    PageRole::CounterOffer,
    PageRole::Addendum,
    PageRole::LocalAddendum,
    PageRole::ContingencyRelease,
];

const BROKER_SETTERS: &[PageRole] = &[PageRole::BrokerInfo, PageRole::MainContract];

const ANY_ROLE: &[PageRole] = &[
    PageRole::MainContract,
    PageRole::CounterOffer,
    PageRole::Addendum,
    PageRole::LocalAddendum,
    PageRole::ContingencyRelease,
    PageRole::Disclosure,
    PageRole::Financing,
    PageRole::BrokerInfo,
    PageRole::TitlePage,
    PageRole::Other,
];

/// Roles permitted to set each field. A value from any other role is dropped
/// and logged, never merged: a disclosure-adjacent page must not silently
/// overwrite the deal price.
pub fn allowed_roles(field: &str) -> &'static [PageRole] {
    match field {
        field::BUYER_NAMES
        | field::SELLER_NAMES
        | field::PROPERTY_ADDRESS
        | field::PURCHASE_PRICE => TERM_SETTERS,
        field::EARNEST_MONEY_DEPOSIT
        | field::FINANCING
        | field::CLOSING
        | field::CLOSING_COSTS
        | field::PERSONAL_PROPERTY_INCLUDED
        | field::ADDITIONAL_TERMS
        | field::CLOSING_DATE => AMENDABLE,
        field::CONTINGENCIES => CONTINGENCY_SETTERS,
        field::BROKERS => BROKER_SETTERS,
        field::BUYER_SIGNATURE_DATES | field::SELLER_SIGNATURE_DATES => ANY_ROLE,
        _ => &[],
    }
}

/// Result of a merge: the reconciled terms plus field-level provenance.
///
/// Invariant: every non-null field traces to exactly one page whose role was
/// allow-listed for it.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub terms: TermSet,
    pub provenance: BTreeMap<String, u32>,
}

struct MergeCtx<'a> {
    provenance: BTreeMap<String, u32>,
    set_by: BTreeMap<&'static str, PageRole>,
    audit: &'a mut AuditTrail,
}

impl MergeCtx<'_> {
    fn permitted(&mut self, field: &'static str, page: u32, role: PageRole) -> bool {
        if allowed_roles(field).contains(&role) {
            return true;
        }
        self.audit.record(
            Stage::Merge,
            format!(
                "dropped {field} from page {page}: role {} is not permitted to set it",
                role.as_str()
            ),
        );
        false
    }

    fn assign(&mut self, field: &'static str, page: u32, role: PageRole) {
        self.provenance.insert(field.to_string(), page);
        self.set_by.insert(field, role);
    }

    /// Field-level override. A non-null candidate replaces the accumulated
    /// value when its role is at least as specific as the role that set it:
    /// later pages of the same role restate terms (multi-page counters), and
    /// amending documents override the main contract. A role processed
    /// earlier in the priority order is never displaced by a less specific
    /// one.
    fn scalar<T: Clone + PartialEq>(
        &mut self,
        field: &'static str,
        target: &mut Option<T>,
        candidate: &Option<T>,
        page: u32,
        role: PageRole,
    ) {
        let Some(value) = candidate else { return };
        if !self.permitted(field, page, role) {
            return;
        }
        match target {
            None => {
                *target = Some(value.clone());
                self.assign(field, page, role);
                self.audit
                    .record(Stage::Merge, format!("set {field} from page {page}"));
            }
            Some(existing) => {
                let setter = self.set_by.get(field).copied().unwrap_or(role);
                if role.priority() < setter.priority() {
                    self.audit.record(
                        Stage::Merge,
                        format!(
                            "kept {field} set by {}; ignored less specific page {page} ({})",
                            setter.as_str(),
                            role.as_str()
                        ),
                    );
                } else if existing != value {
                    *target = Some(value.clone());
                    self.assign(field, page, role);
                    self.audit.record(
                        Stage::Merge,
                        format!("overrode {field} from page {page} ({})", role.as_str()),
                    );
                }
            }
        }
    }

    /// Union new string items into the running array, case-insensitively
    /// de-duplicated, first-appearance order preserved.
    fn array_union(
        &mut self,
        field: &'static str,
        target: &mut Option<Vec<String>>,
        candidate: &Option<Vec<String>>,
        page: u32,
        role: PageRole,
    ) {
        let Some(items) = candidate else { return };
        if items.is_empty() || !self.permitted(field, page, role) {
            return;
        }
        let acc = target.get_or_insert_with(Vec::new);
        let mut added = 0usize;
        for item in items {
            let trimmed = item.trim();
            if trimmed.is_empty() {
                continue;
            }
            let dup = acc.iter().any(|have| have.eq_ignore_ascii_case(trimmed));
            if !dup {
                acc.push(trimmed.to_string());
                added += 1;
            }
        }
        if added > 0 {
            self.assign(field, page, role);
            self.audit.record(
                Stage::Merge,
                format!("added {added} item(s) to {field} from page {page}"),
            );
        } else if acc.is_empty() {
            *target = None;
        }
    }

    /// Strictly-more-complete candidate replaces the accumulated object
    /// wholesale; otherwise only still-null sub-fields are backfilled.
    /// Provenance stays with the primary (most complete) source on backfill.
    fn most_complete<T: Completeness + Clone + PartialEq>(
        &mut self,
        field: &'static str,
        target: &mut Option<T>,
        candidate: &Option<T>,
        page: u32,
        role: PageRole,
    ) {
        let Some(value) = candidate else { return };
        if !self.permitted(field, page, role) {
            return;
        }
        match target {
            None => {
                *target = Some(value.clone());
                self.assign(field, page, role);
                self.audit
                    .record(Stage::Merge, format!("set {field} from page {page}"));
            }
            Some(existing) => {
                if value.filled_count() > existing.filled_count() {
                    *existing = value.clone();
                    self.assign(field, page, role);
                    self.audit.record(
                        Stage::Merge,
                        format!("replaced {field} with more complete page {page}"),
                    );
                } else if existing.backfill_from(value) {
                    self.audit.record(
                        Stage::Merge,
                        format!("backfilled missing {field} sub-fields from page {page}"),
                    );
                }
            }
        }
    }

    /// Sub-field-level merge: a sub-field set by an earlier page is never
    /// overwritten; only previously-null sub-fields are filled.
    fn contingencies(
        &mut self,
        target: &mut Option<Contingencies>,
        candidate: &Option<Contingencies>,
        page: u32,
        role: PageRole,
    ) {
        let Some(value) = candidate else { return };
        if !self.permitted(field::CONTINGENCIES, page, role) {
            return;
        }
        let incoming = strip_calculated(value);
        match target {
            None => {
                *target = Some(incoming);
                self.assign(field::CONTINGENCIES, page, role);
                self.audit.record(
                    Stage::Merge,
                    format!("set {} from page {page}", field::CONTINGENCIES),
                );
            }
            Some(existing) => {
                if existing.fill_missing_from(&incoming) {
                    self.audit.record(
                        Stage::Merge,
                        format!(
                            "filled null {} sub-fields from page {page}",
                            field::CONTINGENCIES
                        ),
                    );
                }
            }
        }
    }
}

/// Calculated deadlines are derived during temporal resolution; anything the
/// model put there is discarded before merging.
fn strip_calculated(c: &Contingencies) -> Contingencies {
    let mut out = c.clone();
    for slot in [&mut out.inspection, &mut out.appraisal, &mut out.loan] {
        if let Some(cont) = slot {
            cont.calculated_deadline = None;
        }
    }
    out
}

/// Reconcile per-page extractions into one term set.
///
/// Deterministic: merging the same records twice yields identical terms and
/// provenance.
pub fn merge_page_terms(records: &[PageTerms], audit: &mut AuditTrail) -> MergeOutcome {
    let mut ordered: Vec<&PageTerms> = records.iter().collect();
    ordered.sort_by_key(|r| (r.page_role.priority(), r.page_number));

    let mut terms = TermSet::default();
    let mut ctx = MergeCtx {
        provenance: BTreeMap::new(),
        set_by: BTreeMap::new(),
        audit,
    };

    for rec in ordered {
        let page = rec.page_number;
        let role = rec.page_role;

        ctx.scalar(field::BUYER_NAMES, &mut terms.buyer_names, &rec.buyer_names, page, role);
        ctx.scalar(field::SELLER_NAMES, &mut terms.seller_names, &rec.seller_names, page, role);
        ctx.scalar(
            field::PROPERTY_ADDRESS,
            &mut terms.property_address,
            &rec.property_address,
            page,
            role,
        );
        ctx.scalar(
            field::PURCHASE_PRICE,
            &mut terms.purchase_price,
            &rec.purchase_price,
            page,
            role,
        );
        ctx.scalar(
            field::EARNEST_MONEY_DEPOSIT,
            &mut terms.earnest_money_deposit,
            &rec.earnest_money_deposit,
            page,
            role,
        );
        ctx.scalar(field::CLOSING_DATE, &mut terms.closing_date, &rec.closing_date, page, role);

        ctx.most_complete(field::FINANCING, &mut terms.financing, &rec.financing, page, role);
        ctx.most_complete(field::CLOSING, &mut terms.closing, &rec.closing, page, role);
        ctx.most_complete(
            field::CLOSING_COSTS,
            &mut terms.closing_costs,
            &rec.closing_costs,
            page,
            role,
        );
        ctx.most_complete(field::BROKERS, &mut terms.brokers, &rec.brokers, page, role);

        ctx.contingencies(&mut terms.contingencies, &rec.contingencies, page, role);

        ctx.array_union(
            field::PERSONAL_PROPERTY_INCLUDED,
            &mut terms.personal_property_included,
            &rec.personal_property_included,
            page,
            role,
        );
        ctx.array_union(
            field::ADDITIONAL_TERMS,
            &mut terms.additional_terms,
            &rec.additional_terms,
            page,
            role,
        );
        ctx.array_union(
            field::BUYER_SIGNATURE_DATES,
            &mut terms.buyer_signature_dates,
            &rec.buyer_signature_dates,
            page,
            role,
        );
        ctx.array_union(
            field::SELLER_SIGNATURE_DATES,
            &mut terms.seller_signature_dates,
            &rec.seller_signature_dates,
            page,
            role,
        );
    }

    MergeOutcome {
        terms,
        provenance: ctx.provenance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Brokers, Contingency, Financing};

    fn page(n: u32, role: PageRole) -> PageTerms {
        PageTerms {
            page_number: n,
            page_label: format!("PAGE {n}"),
            form_code: Some("RPA-CA".to_string()),
            page_role: role,
            ..Default::default()
        }
    }

    #[test]
    fn counter_offer_overrides_main_contract_price() {
        let mut main = page(1, PageRole::MainContract);
        main.purchase_price = Some(500_000.0);
        let mut counter = page(9, PageRole::CounterOffer);
        counter.purchase_price = Some(510_000.0);

        let mut audit = AuditTrail::new();
        let out = merge_page_terms(&[main, counter], &mut audit);

        assert_eq!(out.terms.purchase_price, Some(510_000.0));
        assert_eq!(out.provenance.get(field::PURCHASE_PRICE), Some(&9));
        assert!(audit.mentions(Stage::Merge, "overrode purchasePrice"));
    }

    #[test]
    fn later_page_within_same_role_overrides() {
        let mut counter1 = page(9, PageRole::CounterOffer);
        counter1.purchase_price = Some(505_000.0);
        let mut counter2 = page(10, PageRole::CounterOffer);
        counter2.purchase_price = Some(512_000.0);

        let mut audit = AuditTrail::new();
        let out = merge_page_terms(&[counter2.clone(), counter1], &mut audit);

        assert_eq!(out.terms.purchase_price, Some(512_000.0));
        assert_eq!(out.provenance.get(field::PURCHASE_PRICE), Some(&10));
    }

    #[test]
    fn equal_value_keeps_original_provenance() {
        let mut main = page(1, PageRole::MainContract);
        main.purchase_price = Some(500_000.0);
        let mut counter = page(9, PageRole::CounterOffer);
        counter.purchase_price = Some(500_000.0);

        let mut audit = AuditTrail::new();
        let out = merge_page_terms(&[main, counter], &mut audit);

        assert_eq!(out.provenance.get(field::PURCHASE_PRICE), Some(&1));
    }

    #[test]
    fn disallowed_role_is_dropped_and_logged() {
        let mut broker = page(12, PageRole::BrokerInfo);
        broker.purchase_price = Some(999_999.0);

        let mut audit = AuditTrail::new();
        let out = merge_page_terms(&[broker], &mut audit);

        assert_eq!(out.terms.purchase_price, None);
        assert!(out.provenance.get(field::PURCHASE_PRICE).is_none());
        assert!(audit.mentions(Stage::Merge, "dropped purchasePrice"));
    }

    #[test]
    fn brokers_keep_most_complete_source() {
        let mut sparse = page(2, PageRole::MainContract);
        sparse.brokers = Some(Brokers {
            listing_agent: Some("Jo Lin".into()),
            ..Default::default()
        });
        let mut full = page(14, PageRole::BrokerInfo);
        full.brokers = Some(Brokers {
            listing_brokerage: Some("Sunrise Realty".into()),
            listing_agent: Some("Jo Lin".into()),
            listing_agent_phone: Some("555-0134".into()),
            selling_agent: Some("Ada Ocampo".into()),
            ..Default::default()
        });

        let mut audit = AuditTrail::new();
        let out = merge_page_terms(&[sparse, full], &mut audit);

        let brokers = out.terms.brokers.unwrap();
        assert_eq!(brokers.listing_brokerage.as_deref(), Some("Sunrise Realty"));
        assert_eq!(out.provenance.get(field::BROKERS), Some(&14));
    }

    #[test]
    fn less_complete_candidate_only_backfills() {
        let mut full = page(3, PageRole::MainContract);
        full.financing = Some(Financing {
            loan_type: Some("conventional".into()),
            loan_amount: Some(400_000.0),
            down_payment: Some(100_000.0),
            ..Default::default()
        });
        let mut sparse = page(11, PageRole::Addendum);
        sparse.financing = Some(Financing {
            loan_type: Some("FHA".into()),
            interest_rate: Some(6.25),
            ..Default::default()
        });

        let mut audit = AuditTrail::new();
        let out = merge_page_terms(&[full, sparse], &mut audit);

        let financing = out.terms.financing.unwrap();
        assert_eq!(financing.loan_type.as_deref(), Some("conventional"));
        assert_eq!(financing.interest_rate, Some(6.25), "null sub-field backfilled");
        assert_eq!(out.provenance.get(field::FINANCING), Some(&3));
    }

    #[test]
    fn contingency_sub_fields_are_first_writer_wins() {
        let mut main = page(4, PageRole::MainContract);
        main.contingencies = Some(Contingencies {
            inspection: Some(Contingency {
                days_after_acceptance: Some(17),
                ..Default::default()
            }),
            ..Default::default()
        });
        let mut release = page(18, PageRole::ContingencyRelease);
        release.contingencies = Some(Contingencies {
            inspection: Some(Contingency {
                days_after_acceptance: Some(10),
                waived: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        });

        let mut audit = AuditTrail::new();
        let out = merge_page_terms(&[main, release], &mut audit);

        let inspection = out.terms.contingencies.unwrap().inspection.unwrap();
        assert_eq!(inspection.days_after_acceptance, Some(17), "first writer kept");
        assert_eq!(inspection.waived, Some(true), "null sub-field filled");
        assert_eq!(out.provenance.get(field::CONTINGENCIES), Some(&4));
    }

    #[test]
    fn array_fields_union_case_insensitively() {
        let mut main = page(5, PageRole::MainContract);
        main.personal_property_included = Some(vec!["Refrigerator".into(), "Washer".into()]);
        let mut addendum = page(15, PageRole::Addendum);
        addendum.personal_property_included =
            Some(vec!["refrigerator".into(), "Garage shelving".into()]);

        let mut audit = AuditTrail::new();
        let out = merge_page_terms(&[main, addendum], &mut audit);

        assert_eq!(
            out.terms.personal_property_included.unwrap(),
            vec!["Refrigerator", "Washer", "Garage shelving"]
        );
    }

    #[test]
    fn signature_dates_accepted_from_any_role() {
        let mut disclosure = page(20, PageRole::Other);
        disclosure.buyer_signature_dates = Some(vec!["03/14/2024".into()]);

        let mut audit = AuditTrail::new();
        let out = merge_page_terms(&[disclosure], &mut audit);

        assert_eq!(out.terms.buyer_signature_dates.unwrap(), vec!["03/14/2024"]);
    }

    #[test]
    fn merge_is_deterministic() {
        let mut main = page(1, PageRole::MainContract);
        main.purchase_price = Some(500_000.0);
        main.buyer_names = Some(vec!["Pat Doe".into()]);
        let mut counter = page(9, PageRole::CounterOffer);
        counter.purchase_price = Some(510_000.0);
        let records = vec![main, counter];

        let mut a1 = AuditTrail::new();
        let mut a2 = AuditTrail::new();
        let first = merge_page_terms(&records, &mut a1);
        let second = merge_page_terms(&records, &mut a2);

        assert_eq!(first, second);
    }

    #[test]
    fn calculated_deadlines_from_model_are_discarded() {
        let mut main = page(4, PageRole::MainContract);
        main.contingencies = Some(Contingencies {
            loan: Some(Contingency {
                days_after_acceptance: Some(21),
                calculated_deadline: Some("2030-01-01".into()),
                ..Default::default()
            }),
            ..Default::default()
        });

        let mut audit = AuditTrail::new();
        let out = merge_page_terms(&[main], &mut audit);
        assert!(out.terms.contingencies.unwrap().loan.unwrap().calculated_deadline.is_none());
    }
}
