//! Page role and content category taxonomies.
//!
//! The merge order and the selector's override rules both key off
//! [`PageRole::priority`]; this is the single ordering table for the whole
//! pipeline, so the two can never drift apart.

use serde::{Deserialize, Serialize};

/// Form identity of a page within the contract packet.
///
/// Roles are reported by the classifier. Override kinds (counters, addenda,
/// releases) are documents layered after the main contract that modify
/// specific terms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageRole {
    MainContract,
    CounterOffer,
    Addendum,
    LocalAddendum,
    ContingencyRelease,
    Disclosure,
    Financing,
    BrokerInfo,
    TitlePage,
    #[default]
    #[serde(other)]
    Other,
}

impl PageRole {
    /// Merge priority: lower merges first, and a field set by a
    /// lower-priority-number role is only overridden by pages of the same
    /// role, never by a later one.
    pub fn priority(&self) -> u8 {
        match self {
            Self::MainContract => 0,
            Self::CounterOffer => 1,
            Self::Addendum => 2,
            Self::LocalAddendum => 3,
            Self::ContingencyRelease => 4,
            Self::BrokerInfo => 5,
            Self::Financing => 6,
            Self::Disclosure => 7,
            Self::TitlePage => 8,
            Self::Other => 9,
        }
    }

    /// Whether this role is an amending document layered on the main contract.
    pub fn is_override(&self) -> bool {
        matches!(
            self,
            Self::CounterOffer | Self::Addendum | Self::LocalAddendum | Self::ContingencyRelease
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MainContract => "main_contract",
            Self::CounterOffer => "counter_offer",
            Self::Addendum => "addendum",
            Self::LocalAddendum => "local_addendum",
            Self::ContingencyRelease => "contingency_release",
            Self::Disclosure => "disclosure",
            Self::Financing => "financing",
            Self::BrokerInfo => "broker_info",
            Self::TitlePage => "title_page",
            Self::Other => "other",
        }
    }
}

/// Dominant content kind of a page, independent of which form it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    TransactionTerms,
    Signatures,
    BrokerInfo,
    Disclosures,
    Boilerplate,
    #[serde(other)]
    Other,
}

impl ContentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransactionTerms => "transaction_terms",
            Self::Signatures => "signatures",
            Self::BrokerInfo => "broker_info",
            Self::Disclosures => "disclosures",
            Self::Boilerplate => "boilerplate",
            Self::Other => "other",
        }
    }

    /// Human-readable form used in critical-page labels.
    pub fn label(&self) -> &'static str {
        match self {
            Self::TransactionTerms => "TRANSACTION TERMS",
            Self::Signatures => "SIGNATURES",
            Self::BrokerInfo => "BROKER INFO",
            Self::Disclosures => "DISCLOSURES",
            Self::Boilerplate => "BOILERPLATE",
            Self::Other => "OTHER",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_priority_order_matches_pipeline_contract() {
        // main_contract → counter_offer → addendum → broker_info
        assert!(PageRole::MainContract.priority() < PageRole::CounterOffer.priority());
        assert!(PageRole::CounterOffer.priority() < PageRole::Addendum.priority());
        assert!(PageRole::Addendum.priority() < PageRole::BrokerInfo.priority());
    }

    #[test]
    fn override_roles() {
        assert!(PageRole::CounterOffer.is_override());
        assert!(PageRole::Addendum.is_override());
        assert!(PageRole::LocalAddendum.is_override());
        assert!(PageRole::ContingencyRelease.is_override());
        assert!(!PageRole::MainContract.is_override());
        assert!(!PageRole::Disclosure.is_override());
    }

    #[test]
    fn role_round_trips_through_serde() {
        let json = serde_json::to_string(&PageRole::CounterOffer).unwrap();
        assert_eq!(json, "\"counter_offer\"");
        let back: PageRole = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PageRole::CounterOffer);
    }

    #[test]
    fn unknown_role_maps_to_other() {
        let role: PageRole = serde_json::from_str("\"mystery_form\"").unwrap();
        assert_eq!(role, PageRole::Other);
        let cat: ContentCategory = serde_json::from_str("\"haiku\"").unwrap();
        assert_eq!(cat, ContentCategory::Other);
    }
}
