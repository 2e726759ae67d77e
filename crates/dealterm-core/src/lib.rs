//! Dealterm core: data model and pure logic for contract term extraction.
//!
//! A scanned purchase-contract packet arrives as ordered page images. An
//! external vision model classifies and extracts; this crate owns everything
//! deterministic around those calls:
//!
//! - the packet/term data model ([`model`]),
//! - the role priority table shared by selection and merge ([`role`]),
//! - critical page selection ([`select`]),
//! - the conflict-resolving merge engine ([`merge`]),
//! - temporal resolution of acceptance/closing/contingency dates ([`dates`]),
//! - type coercion of loosely-typed model output ([`coerce`]),
//! - validation of the resolved terms ([`validate`]),
//! - and the structured audit trail returned with every run ([`audit`]).
//!
//! Nothing here performs I/O; orchestration lives in `dealterm-pipeline`.

pub mod audit;
pub mod coerce;
pub mod dates;
pub mod merge;
pub mod model;
pub mod role;
pub mod select;
pub mod validate;

pub use audit::{AuditEntry, AuditTrail, Stage};
pub use merge::{allowed_roles, merge_page_terms, MergeOutcome};
pub use model::{
    Brokers, Closing, ClosingCosts, Completeness, Contingencies, Contingency, CriticalPage,
    EarnestMoneyDeposit, Financing, MediaType, Page, PageClassification, PageTerms, TermSet,
};
pub use role::{ContentCategory, PageRole};
pub use select::select_critical_pages;
pub use validate::{validate_terms, ValidationReport};
