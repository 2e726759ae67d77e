//! Structured audit trail.
//!
//! Every stage of a run appends human-readable entries here instead of
//! writing to stdout, so callers can surface the narration and tests can
//! assert on it. The trail is returned alongside the final term set.

use serde::{Deserialize, Serialize};

/// Pipeline stage that produced an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Classify,
    Select,
    Coerce,
    Extract,
    Merge,
    Temporal,
    Validate,
    SecondTurn,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classify => "classify",
            Self::Select => "select",
            Self::Coerce => "coerce",
            Self::Extract => "extract",
            Self::Merge => "merge",
            Self::Temporal => "temporal",
            Self::Validate => "validate",
            Self::SecondTurn => "second_turn",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub stage: Stage,
    pub message: String,
}

/// Ordered log of everything a run decided and why.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditTrail {
    entries: Vec<AuditEntry>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: Stage, message: impl Into<String>) {
        self.entries.push(AuditEntry {
            stage,
            message: message.into(),
        });
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn for_stage(&self, stage: Stage) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter().filter(move |e| e.stage == stage)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if any entry for `stage` contains `needle`.
    pub fn mentions(&self, stage: Stage, needle: &str) -> bool {
        self.for_stage(stage).any(|e| e.message.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order() {
        let mut trail = AuditTrail::new();
        trail.record(Stage::Merge, "set purchasePrice from page 3");
        trail.record(Stage::Temporal, "effective date 2024-03-15");

        assert_eq!(trail.len(), 2);
        assert_eq!(trail.entries()[0].stage, Stage::Merge);
        assert!(trail.mentions(Stage::Temporal, "2024-03-15"));
        assert!(!trail.mentions(Stage::Merge, "2024-03-15"));
    }
}
