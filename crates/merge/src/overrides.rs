//! Manual correction layer.
//!
//! The override table maps an entity name to a patch. A patch is either
//! still pending operator review or already reviewed, decided when the raw
//! JSON object is converted. Reviewed patches may or may not carry field
//! corrections.
//!
//! Link fields accept a single URL or a list. The first list element
//! overwrites the record's field, every further element becomes a derived
//! record `{baseId}_manual_{field}_{identifier}`.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MergeError;
use crate::io::{read_json, write_json_pretty};
use crate::model::{record_key, sort_records, LinkField, ScrapedRecord, RECORD_KEYS};
use crate::normalize::{canonicalize_record, clean_link, website_domain};
use crate::rules::{classify, extract_selector, Classification};

const PROCESSED_KEY: &str = "_processed";
const URLS_KEY: &str = "urls";
const NAME_KEY: &str = "name";

/// Current override file format.
pub const OVERRIDE_FILE_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Patch types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkValue {
    One(String),
    Many(Vec<String>),
}

impl LinkValue {
    fn contains(&self, url: &str) -> bool {
        match self {
            Self::One(u) => u == url,
            Self::Many(urls) => urls.iter().any(|u| u == url),
        }
    }

    fn push(&mut self, url: String) {
        match self {
            Self::One(u) if u.is_empty() => *u = url,
            Self::One(u) => {
                let first = std::mem::take(u);
                *self = Self::Many(vec![first, url]);
            }
            Self::Many(urls) => urls.push(url),
        }
    }
}

/// Field corrections of one patch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchFields {
    pub name: Option<String>,
    pub links: BTreeMap<LinkField, LinkValue>,
    /// Unclassified URLs kept for manual triage. Never written to a record.
    pub urls: Vec<String>,
    /// Any other record field, written only if already populated.
    pub other: BTreeMap<String, Value>,
}

impl PatchFields {
    /// True when applying the patch would change the record.
    pub fn has_corrections(&self) -> bool {
        self.name.is_some() || !self.links.is_empty() || !self.other.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_corrections() && self.urls.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Value>",
    into = "BTreeMap<String, Value>"
)]
pub enum OverridePatch {
    Unprocessed(PatchFields),
    Processed(Option<PatchFields>),
}

impl OverridePatch {
    pub fn fields(&self) -> Option<&PatchFields> {
        match self {
            Self::Unprocessed(fields) => Some(fields),
            Self::Processed(fields) => fields.as_ref(),
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self, Self::Processed(_))
    }
}

impl TryFrom<BTreeMap<String, Value>> for OverridePatch {
    type Error = String;

    fn try_from(mut raw: BTreeMap<String, Value>) -> Result<Self, Self::Error> {
        let processed = match raw.remove(PROCESSED_KEY) {
            None => false,
            Some(Value::Bool(b)) => b,
            Some(other) => return Err(format!("{PROCESSED_KEY} must be a boolean, got {other}")),
        };

        let mut fields = PatchFields::default();
        if let Some(urls) = raw.remove(URLS_KEY) {
            fields.urls = serde_json::from_value(urls)
                .map_err(|e| format!("{URLS_KEY} must be a list of URLs: {e}"))?;
        }
        match raw.remove(NAME_KEY) {
            None => {}
            Some(Value::String(name)) => fields.name = Some(name),
            Some(other) => return Err(format!("{NAME_KEY} must be a string, got {other}")),
        }
        for (key, value) in raw {
            match LinkField::parse(&key) {
                Some(field) => {
                    let value: LinkValue = serde_json::from_value(value)
                        .map_err(|_| format!("{key} must be a URL or a list of URLs"))?;
                    fields.links.insert(field, value);
                }
                None => {
                    fields.other.insert(key, value);
                }
            }
        }

        Ok(if processed {
            Self::Processed((!fields.is_empty()).then_some(fields))
        } else {
            Self::Unprocessed(fields)
        })
    }
}

impl From<OverridePatch> for BTreeMap<String, Value> {
    fn from(patch: OverridePatch) -> Self {
        let (processed, fields) = match patch {
            OverridePatch::Unprocessed(fields) => (false, Some(fields)),
            OverridePatch::Processed(fields) => (true, fields),
        };

        let mut raw = BTreeMap::new();
        if processed {
            raw.insert(PROCESSED_KEY.to_string(), Value::Bool(true));
        }
        let Some(fields) = fields else {
            return raw;
        };

        if let Some(name) = fields.name {
            raw.insert(NAME_KEY.to_string(), Value::String(name));
        }
        for (field, value) in fields.links {
            let value = match value {
                LinkValue::One(url) => Value::String(url),
                LinkValue::Many(urls) => Value::Array(urls.into_iter().map(Value::String).collect()),
            };
            raw.insert(field.as_str().to_string(), value);
        }
        if !fields.urls.is_empty() {
            raw.insert(
                URLS_KEY.to_string(),
                Value::Array(fields.urls.into_iter().map(Value::String).collect()),
            );
        }
        raw.extend(fields.other);
        raw
    }
}

// ---------------------------------------------------------------------------
// Override table
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct OverrideFile {
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    overrides: BTreeMap<String, OverridePatch>,
}

/// Result of routing operator-supplied URLs into a patch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TriageOutcome {
    pub assigned: Vec<(LinkField, String)>,
    pub discarded: Vec<String>,
    pub unclassified: Vec<String>,
}

/// Patches keyed by entity name, sorted by key on save.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideTable {
    entries: BTreeMap<String, OverridePatch>,
}

impl OverrideTable {
    /// Load the table. A missing file is an empty table.
    pub fn load(path: &Path) -> Result<Self, MergeError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no override table, starting empty");
            return Ok(Self::default());
        }
        let file: OverrideFile = read_json(path)?;
        if file.version != OVERRIDE_FILE_VERSION {
            return Err(MergeError::SchemaViolation {
                file: path.display().to_string(),
                message: format!(
                    "unsupported override file version {} (expected {OVERRIDE_FILE_VERSION})",
                    file.version
                ),
            });
        }
        tracing::info!(path = %path.display(), patches = file.overrides.len(), "loaded overrides");
        Ok(Self {
            entries: file.overrides,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), MergeError> {
        let file = OverrideFile {
            version: OVERRIDE_FILE_VERSION,
            updated_at: Some(Utc::now()),
            overrides: self.entries.clone(),
        };
        write_json_pretty(path, &file)
    }

    pub fn get(&self, name: &str) -> Option<&OverridePatch> {
        self.entries.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, patch: OverridePatch) {
        self.entries.insert(name.into(), patch);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OverridePatch)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_processed(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(OverridePatch::is_processed)
    }

    /// Mark an entity reviewed, keeping any corrections it already has.
    pub fn mark_processed(&mut self, name: &str) {
        let patch = match self.entries.remove(name) {
            None => OverridePatch::Processed(None),
            Some(OverridePatch::Unprocessed(fields)) => {
                OverridePatch::Processed((!fields.is_empty()).then_some(fields))
            }
            Some(processed) => processed,
        };
        self.entries.insert(name.to_string(), patch);
    }

    fn fields_mut(&mut self, name: &str) -> &mut PatchFields {
        let patch = self
            .entries
            .entry(name.to_string())
            .or_insert_with(|| OverridePatch::Unprocessed(PatchFields::default()));
        match patch {
            OverridePatch::Unprocessed(fields) => fields,
            OverridePatch::Processed(fields) => fields.get_or_insert_with(PatchFields::default),
        }
    }

    /// Route URLs found by the operator: network matches are appended to
    /// that link field, discarded URLs are dropped, the rest go to `urls`.
    pub fn triage(&mut self, name: &str, urls: &[String]) -> TriageOutcome {
        let mut outcome = TriageOutcome::default();
        let fields = self.fields_mut(name);

        for url in urls.iter().map(|u| u.trim()).filter(|u| !u.is_empty()) {
            match classify(url) {
                Classification::Network { field, .. } => {
                    let slot = fields
                        .links
                        .entry(field)
                        .or_insert_with(|| LinkValue::Many(Vec::new()));
                    if !slot.contains(url) {
                        slot.push(url.to_string());
                    }
                    outcome.assigned.push((field, url.to_string()));
                }
                Classification::Discarded { reason } => {
                    tracing::debug!(url, %reason, "discarded");
                    outcome.discarded.push(url.to_string());
                }
                Classification::Unclassified => {
                    if !fields.urls.iter().any(|u| u == url) {
                        fields.urls.push(url.to_string());
                    }
                    outcome.unclassified.push(url.to_string());
                }
            }
        }
        outcome
    }
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

/// One base record after patching.
#[derive(Debug, Clone, PartialEq)]
pub struct Patched {
    pub primary: ScrapedRecord,
    pub derived: Vec<ScrapedRecord>,
}

/// Id fragment for a derived record. Websites use their domain, every
/// other network the selector captured by its rule.
pub fn derived_identifier(url: &str, field: LinkField) -> Option<String> {
    if field == LinkField::Ws {
        let domain = website_domain(url);
        return (!domain.is_empty()).then(|| domain.replace('.', "_"));
    }
    extract_selector(url, field).map(|s| s.as_str().replace('/', "_"))
}

/// Apply one patch. Without field corrections the record passes through.
pub fn apply_override(
    record: ScrapedRecord,
    patch: Option<&OverridePatch>,
) -> Result<Patched, MergeError> {
    let Some(fields) = patch.and_then(OverridePatch::fields).filter(|f| f.has_corrections()) else {
        return Ok(Patched {
            primary: record,
            derived: Vec::new(),
        });
    };

    let base_name = record.name.clone();
    let mut primary = record;
    let mut derived = Vec::new();

    if let Some(name) = &fields.name {
        primary.name.clone_from(name);
    }

    for (&field, value) in &fields.links {
        match value {
            LinkValue::One(url) => primary.set_link(field, clean_link(url)),
            LinkValue::Many(urls) => {
                if let Some(first) = urls.first() {
                    primary.set_link(field, clean_link(first));
                }
                for url in urls.iter().skip(1).filter(|u| !u.trim().is_empty()) {
                    let identifier = derived_identifier(url, field).ok_or_else(|| {
                        MergeError::UnextractableSelector {
                            entity: base_name.clone(),
                            field,
                            url: url.clone(),
                        }
                    })?;
                    let mut record = ScrapedRecord::new(
                        format!("{}_manual_{field}_{identifier}", primary.id),
                        base_name.clone(),
                        primary.reasons.clone(),
                    );
                    record.set_link(field, clean_link(url));
                    tracing::debug!(id = %record.id, %field, url = %url, "derived record");
                    derived.push(record);
                }
            }
        }
    }

    apply_other_fields(&mut primary, &fields.other, &base_name)?;

    tracing::debug!(name = %primary.name, derived = derived.len(), "override applied");
    Ok(Patched { primary, derived })
}

/// Write non-link values onto the record. Any key of the record schema is
/// accepted, blank or not; anything else is a typo.
fn apply_other_fields(
    record: &mut ScrapedRecord,
    other: &BTreeMap<String, Value>,
    entity: &str,
) -> Result<(), MergeError> {
    if other.is_empty() {
        return Ok(());
    }

    let invalid = |key: &str, message: String| MergeError::InvalidOverrideValue {
        entity: entity.to_string(),
        key: key.to_string(),
        message,
    };

    let mut value = serde_json::to_value(&*record).map_err(|e| invalid("*", e.to_string()))?;
    let Value::Object(map) = &mut value else {
        return Err(invalid("*", "record is not a JSON object".into()));
    };

    for (key, patch_value) in other {
        let Some(target) = record_key(key) else {
            return Err(MergeError::AmbiguousOverrideKey {
                entity: entity.to_string(),
                key: key.clone(),
                valid: RECORD_KEYS.join(", "),
            });
        };
        map.insert(target.to_string(), patch_value.clone());
        serde_json::from_value::<ScrapedRecord>(Value::Object(map.clone()))
            .map_err(|e| invalid(key, e.to_string()))?;
    }

    *record = serde_json::from_value(value).map_err(|e| invalid("*", e.to_string()))?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct PatchOutput {
    /// Primary and derived records, sorted by name then id.
    pub records: Vec<ScrapedRecord>,
    /// Records whose patch carried corrections.
    pub patched: usize,
    pub derived: usize,
}

/// Canonicalize every merged record and apply its patch, looked up by
/// name. Fails on the first bad patch.
pub fn apply_overrides(
    records: Vec<ScrapedRecord>,
    table: &OverrideTable,
) -> Result<PatchOutput, MergeError> {
    let mut primaries = Vec::with_capacity(records.len());
    let mut derived = Vec::new();
    let mut patched = 0usize;

    for mut record in records {
        canonicalize_record(&mut record);
        let patch = table.get(&record.name);
        if patch.and_then(OverridePatch::fields).is_some_and(PatchFields::has_corrections) {
            patched += 1;
        }
        let out = apply_override(record, patch)?;
        primaries.push(out.primary);
        derived.extend(out.derived);
    }

    let derived_count = derived.len();
    primaries.extend(derived);
    sort_records(&mut primaries);

    tracing::info!(
        records = primaries.len(),
        patched,
        derived = derived_count,
        "overrides applied"
    );
    Ok(PatchOutput {
        records: primaries,
        patched,
        derived: derived_count,
    })
}
