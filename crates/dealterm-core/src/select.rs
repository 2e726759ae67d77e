//! Critical page selection.
//!
//! Pure rule engine over the classification array; no I/O. This is the main
//! defense against extracting from 100-page disclosure-heavy packets:
//! typical packets lose 80-95% of their pages here.

use crate::model::{CriticalPage, PageClassification};
use crate::role::{ContentCategory, PageRole};

/// Categories under which an addendum-style page still carries negotiable
/// terms. Disclosure-styled or signature-only "addenda" fall outside this
/// whitelist and are excluded even when filled.
const ADDENDUM_CATEGORY_WHITELIST: &[ContentCategory] =
    &[ContentCategory::TransactionTerms, ContentCategory::Boilerplate];

/// Decide which pages carry extractable content.
///
/// `classifications` is indexed by absolute page (entry 0 = page 1); `None`
/// entries are pages where no form was detected. `force_include` pins pages
/// in regardless of their classification; an unclassified forced page gets
/// a generic label. Output is sorted and de-duplicated by page number.
pub fn select_critical_pages(
    classifications: &[Option<PageClassification>],
    force_include: &[u32],
) -> Vec<CriticalPage> {
    let mut selected: Vec<CriticalPage> = Vec::new();

    for (idx, slot) in classifications.iter().enumerate() {
        let page_number = idx as u32 + 1;
        let forced = force_include.contains(&page_number);

        match slot {
            Some(cls) => {
                if forced || is_critical(cls) {
                    selected.push(CriticalPage {
                        page_number,
                        label: page_label(cls),
                    });
                }
            }
            None if forced => {
                selected.push(CriticalPage {
                    page_number,
                    label: format!("PAGE {page_number} – KEY CONTRACT PAGE"),
                });
            }
            None => {}
        }
    }

    // Forced pages beyond the classified range still count.
    for &page_number in force_include {
        if page_number as usize > classifications.len() {
            selected.push(CriticalPage {
                page_number,
                label: format!("PAGE {page_number} – KEY CONTRACT PAGE"),
            });
        }
    }

    selected.sort_by_key(|p| p.page_number);
    selected.dedup_by_key(|p| p.page_number);
    selected
}

/// The per-page decision rules, in order.
fn is_critical(cls: &PageClassification) -> bool {
    if cls.role.is_override() {
        // Override documents only matter when someone wrote on them.
        if !cls.has_filled_fields {
            return false;
        }
        // Counter offers and contingency releases are always in when filled;
        // addenda additionally need a category that carries negotiable terms.
        return match cls.role {
            PageRole::Addendum | PageRole::LocalAddendum => {
                ADDENDUM_CATEGORY_WHITELIST.contains(&cls.content_category)
            }
            _ => true,
        };
    }

    if cls.role == PageRole::MainContract {
        return match cls.content_category {
            // Final acceptance dates and agent contacts matter even on an
            // otherwise-unfilled page.
            ContentCategory::Signatures | ContentCategory::BrokerInfo => true,
            ContentCategory::Disclosures | ContentCategory::Boilerplate | ContentCategory::Other => {
                false
            }
            ContentCategory::TransactionTerms => cls.has_filled_fields,
        };
    }

    false
}

fn page_label(cls: &PageClassification) -> String {
    let form_page = cls
        .form_page
        .map(|p| p.to_string())
        .unwrap_or_else(|| "?".to_string());
    let filled = if cls.has_filled_fields { " (FILLED)" } else { "" };
    format!(
        "{} PAGE {} – {}{}",
        cls.form_code,
        form_page,
        cls.content_category.label(),
        filled
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cls(
        pdf_page: u32,
        role: PageRole,
        category: ContentCategory,
        filled: bool,
    ) -> PageClassification {
        PageClassification {
            pdf_page,
            form_code: "RPA-CA".to_string(),
            form_revision: None,
            form_page: Some(pdf_page),
            total_pages_in_form: Some(16),
            role,
            content_category: category,
            has_filled_fields: filled,
            confidence: 90.0,
            title_snippet: None,
            footer_text: None,
        }
    }

    #[test]
    fn filled_counter_offer_always_selected() {
        let pages = vec![Some(cls(
            1,
            PageRole::CounterOffer,
            ContentCategory::Disclosures,
            true,
        ))];
        let picked = select_critical_pages(&pages, &[]);
        assert_eq!(picked.len(), 1);
    }

    #[test]
    fn unfilled_override_pages_excluded() {
        let pages = vec![
            Some(cls(1, PageRole::CounterOffer, ContentCategory::TransactionTerms, false)),
            Some(cls(2, PageRole::ContingencyRelease, ContentCategory::TransactionTerms, false)),
        ];
        assert!(select_critical_pages(&pages, &[]).is_empty());
    }

    #[test]
    fn disclosure_styled_addendum_excluded_even_when_filled() {
        let pages = vec![Some(cls(
            1,
            PageRole::Addendum,
            ContentCategory::Disclosures,
            true,
        ))];
        assert!(select_critical_pages(&pages, &[]).is_empty());
    }

    #[test]
    fn transaction_terms_addendum_selected_when_filled() {
        let pages = vec![
            Some(cls(1, PageRole::Addendum, ContentCategory::TransactionTerms, true)),
            Some(cls(2, PageRole::LocalAddendum, ContentCategory::Boilerplate, true)),
        ];
        assert_eq!(select_critical_pages(&pages, &[]).len(), 2);
    }

    #[test]
    fn main_contract_signatures_selected_even_unfilled() {
        let pages = vec![
            Some(cls(1, PageRole::MainContract, ContentCategory::Signatures, false)),
            Some(cls(2, PageRole::MainContract, ContentCategory::BrokerInfo, false)),
        ];
        assert_eq!(select_critical_pages(&pages, &[]).len(), 2);
    }

    #[test]
    fn main_contract_terms_require_filled_fields() {
        let pages = vec![
            Some(cls(1, PageRole::MainContract, ContentCategory::TransactionTerms, false)),
            Some(cls(2, PageRole::MainContract, ContentCategory::TransactionTerms, true)),
            Some(cls(3, PageRole::MainContract, ContentCategory::Disclosures, true)),
            Some(cls(4, PageRole::MainContract, ContentCategory::Boilerplate, true)),
        ];
        let picked = select_critical_pages(&pages, &[]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].page_number, 2);
    }

    #[test]
    fn non_contract_roles_excluded() {
        let pages = vec![
            Some(cls(1, PageRole::Disclosure, ContentCategory::TransactionTerms, true)),
            Some(cls(2, PageRole::TitlePage, ContentCategory::Other, true)),
            Some(cls(3, PageRole::Other, ContentCategory::TransactionTerms, true)),
        ];
        assert!(select_critical_pages(&pages, &[]).is_empty());
    }

    #[test]
    fn labels_combine_form_code_page_and_category() {
        let pages = vec![Some(cls(
            4,
            PageRole::MainContract,
            ContentCategory::TransactionTerms,
            true,
        ))];
        let picked = select_critical_pages(&pages, &[]);
        assert_eq!(picked[0].label, "RPA-CA PAGE 4 – TRANSACTION TERMS (FILLED)");
    }

    #[test]
    fn forced_unclassified_page_gets_generic_label() {
        let pages = vec![None, None];
        let picked = select_critical_pages(&pages, &[2]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].label, "PAGE 2 – KEY CONTRACT PAGE");
    }

    #[test]
    fn unforced_unclassified_pages_stay_out() {
        let pages = vec![None, None, None];
        assert!(select_critical_pages(&pages, &[]).is_empty());
    }

    #[test]
    fn output_sorted_and_deduped() {
        let pages = vec![
            Some(cls(1, PageRole::MainContract, ContentCategory::Signatures, false)),
            Some(cls(2, PageRole::CounterOffer, ContentCategory::TransactionTerms, true)),
        ];
        let picked = select_critical_pages(&pages, &[2, 1]);
        assert_eq!(
            picked.iter().map(|p| p.page_number).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }
}
