//! Type coercion for raw per-page extraction records.
//!
//! The model frequently returns a numeric price as `"$510,000"`, a lone name
//! where an array is expected, or `"yes"` for a boolean. A fixed table of
//! (field path, kind) pairs is applied to each raw JSON record before typed
//! deserialization; every value that actually changed shape is logged.
//! Uncoercible values are nulled rather than allowed to poison the record.

use serde_json::Value;

use crate::audit::{AuditTrail, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Str,
    StrArray,
    Num,
    Bool,
}

/// The canonical shape of every loosely-typed field in a per-page record.
const COERCIONS: &[(&str, Kind)] = &[
    ("pageNumber", Kind::Num),
    ("formPage", Kind::Num),
    ("confidence", Kind::Num),
    ("buyerNames", Kind::StrArray),
    ("sellerNames", Kind::StrArray),
    ("propertyAddress", Kind::Str),
    ("purchasePrice", Kind::Num),
    ("earnestMoneyDeposit.amount", Kind::Num),
    ("earnestMoneyDeposit.dueWithinDays", Kind::Num),
    ("financing.loanAmount", Kind::Num),
    ("financing.downPayment", Kind::Num),
    ("financing.interestRate", Kind::Num),
    ("financing.cashOffer", Kind::Bool),
    ("contingencies.inspection.waived", Kind::Bool),
    ("contingencies.inspection.daysAfterAcceptance", Kind::Num),
    ("contingencies.appraisal.waived", Kind::Bool),
    ("contingencies.appraisal.daysAfterAcceptance", Kind::Num),
    ("contingencies.loan.waived", Kind::Bool),
    ("contingencies.loan.daysAfterAcceptance", Kind::Num),
    ("closing.daysAfterAcceptance", Kind::Num),
    ("closing.closeOfEscrowDate", Kind::Str),
    ("closingCosts.homeWarrantyAmount", Kind::Num),
    ("personalPropertyIncluded", Kind::StrArray),
    ("additionalTerms", Kind::StrArray),
    ("buyerSignatureDates", Kind::StrArray),
    ("sellerSignatureDates", Kind::StrArray),
    ("closingDate", Kind::Str),
];

enum Outcome {
    Unchanged,
    Changed(Value),
    Failed,
}

/// Apply the coercion table to one raw record. The record's own
/// `pageNumber` is only used to label audit messages.
pub fn coerce_record(record: &mut Value, audit: &mut AuditTrail) {
    let page_hint = record
        .get("pageNumber")
        .and_then(Value::as_u64)
        .map(|n| n.to_string())
        .unwrap_or_else(|| "?".to_string());

    for &(path, kind) in COERCIONS {
        let Some(slot) = lookup_path(record, path) else {
            continue;
        };
        if slot.is_null() {
            continue;
        }
        match coerce_value(slot, kind) {
            Outcome::Unchanged => {}
            Outcome::Changed(new) => {
                audit.record(
                    Stage::Coerce,
                    format!("page {page_hint}: coerced {path} to {kind:?}"),
                );
                *slot = new;
            }
            Outcome::Failed => {
                audit.record(
                    Stage::Coerce,
                    format!("page {page_hint}: {path} is not coercible to {kind:?}; nulled"),
                );
                *slot = Value::Null;
            }
        }
    }
}

fn lookup_path<'a>(record: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = record;
    for segment in path.split('.') {
        current = current.as_object_mut()?.get_mut(segment)?;
    }
    Some(current)
}

fn coerce_value(value: &Value, kind: Kind) -> Outcome {
    match kind {
        Kind::Num => coerce_num(value),
        Kind::Str => coerce_str(value),
        Kind::Bool => coerce_bool(value),
        Kind::StrArray => coerce_str_array(value),
    }
}

fn coerce_num(value: &Value) -> Outcome {
    match value {
        Value::Number(_) => Outcome::Unchanged,
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !matches!(c, '$' | ',' | ' '))
                .collect();
            // Prefer an integer representation so day-count fields stay
            // deserializable as integers.
            if let Ok(i) = cleaned.parse::<i64>() {
                return Outcome::Changed(Value::Number(i.into()));
            }
            match cleaned.parse::<f64>() {
                Ok(n) if n.is_finite() => serde_json::Number::from_f64(n)
                    .map(|n| Outcome::Changed(Value::Number(n)))
                    .unwrap_or(Outcome::Failed),
                _ => Outcome::Failed,
            }
        }
        _ => Outcome::Failed,
    }
}

fn coerce_str(value: &Value) -> Outcome {
    match value {
        Value::String(_) => Outcome::Unchanged,
        Value::Number(n) => Outcome::Changed(Value::String(n.to_string())),
        Value::Bool(b) => Outcome::Changed(Value::String(b.to_string())),
        _ => Outcome::Failed,
    }
}

fn coerce_bool(value: &Value) -> Outcome {
    match value {
        Value::Bool(_) => Outcome::Unchanged,
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "x" | "1" | "waived" => Outcome::Changed(Value::Bool(true)),
            "false" | "no" | "n" | "0" => Outcome::Changed(Value::Bool(false)),
            _ => Outcome::Failed,
        },
        Value::Number(n) => Outcome::Changed(Value::Bool(n.as_f64() != Some(0.0))),
        _ => Outcome::Failed,
    }
}

fn coerce_str_array(value: &Value) -> Outcome {
    match value {
        Value::Array(items) => {
            if items.iter().all(Value::is_string) {
                return Outcome::Unchanged;
            }
            let converted: Vec<Value> = items
                .iter()
                .filter_map(|item| match coerce_str(item) {
                    Outcome::Unchanged => Some(item.clone()),
                    Outcome::Changed(v) => Some(v),
                    Outcome::Failed => None,
                })
                .collect();
            Outcome::Changed(Value::Array(converted))
        }
        Value::String(s) => Outcome::Changed(Value::Array(vec![Value::String(s.clone())])),
        Value::Number(n) => {
            Outcome::Changed(Value::Array(vec![Value::String(n.to_string())]))
        }
        _ => Outcome::Failed,
    }
}
