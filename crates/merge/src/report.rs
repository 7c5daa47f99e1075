use std::collections::BTreeMap;

use serde::Serialize;

/// Non-fatal noise recorded during a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Two records/entries share a key that should have been unique.
    DuplicateKeyCollision,
    /// A link did not match its network's pattern.
    Unmatched,
    /// Website domain filtered out by the exclusion rules.
    ExcludedWebsite,
    /// Static list entry not turned into a record.
    SkippedStaticEntry,
}

impl std::fmt::Display for WarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKeyCollision => write!(f, "duplicate_key_collision"),
            Self::Unmatched => write!(f, "unmatched"),
            Self::ExcludedWebsite => write!(f, "excluded_website"),
            Self::SkippedStaticEntry => write!(f, "skipped_static_entry"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub entity: String,
    pub detail: String,
}

/// Warnings collected across one or more stages; printed as a summary at the
/// end of a run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Warnings {
    items: Vec<Warning>,
}

impl Warnings {
    /// Record and log a warning.
    pub fn push(&mut self, kind: WarningKind, entity: impl Into<String>, detail: impl Into<String>) {
        let warning = Warning {
            kind,
            entity: entity.into(),
            detail: detail.into(),
        };
        tracing::warn!(kind = %warning.kind, entity = %warning.entity, "{}", warning.detail);
        self.items.push(warning);
    }

    pub fn extend(&mut self, other: Warnings) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn of_kind(&self, kind: WarningKind) -> impl Iterator<Item = &Warning> {
        self.items.iter().filter(move |w| w.kind == kind)
    }

    /// Count per kind, ordered by kind.
    pub fn summary(&self) -> BTreeMap<WarningKind, usize> {
        let mut counts = BTreeMap::new();
        for w in &self.items {
            *counts.entry(w.kind).or_insert(0) += 1;
        }
        counts
    }
}
