//! Join per-network extraction files back into one record per id.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde_json::Value;

use crate::error::MergeError;
use crate::io::{json_files, read_json};
use crate::model::{by_name, FinalRecord, FlaggedEntry, LinkField};

/// Curated annotations keyed by entity id, attached verbatim as `alt`.
pub type Alternatives = BTreeMap<String, Value>;

pub fn load_alternatives(path: &Path) -> Result<Alternatives, MergeError> {
    read_json(path)
}

/// Fold extraction files in `LinkField::ALL` order. The first entry seen
/// for an id creates the record; later entries add their selector, union
/// reasons and fill a missing stock symbol.
pub fn assemble(
    files: &[(String, Vec<FlaggedEntry>)],
    alternatives: Option<&Alternatives>,
) -> Result<Vec<FinalRecord>, MergeError> {
    let mut mapped = files
        .iter()
        .map(|(stem, entries)| {
            LinkField::from_file_stem(stem)
                .map(|field| (field, entries))
                .ok_or_else(|| MergeError::UnknownExtractionFileMapping { file: stem.clone() })
        })
        .collect::<Result<Vec<_>, _>>()?;
    mapped.sort_by_key(|(field, _)| *field);

    let mut records: Vec<FinalRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (field, entries) in mapped {
        for entry in entries {
            let i = *index.entry(entry.id.clone()).or_insert_with(|| {
                records.push(FinalRecord::from_entry(entry));
                records.len() - 1
            });
            let record = &mut records[i];
            *record.selector_mut(field) = Some(entry.selector.clone());
            record.reasons.union(&entry.reasons);
            if record.stock_symbol.is_none() {
                record.stock_symbol.clone_from(&entry.stock_symbol);
            }
        }
    }

    if let Some(alternatives) = alternatives {
        for record in &mut records {
            record.alternatives = alternatives.get(&record.id).cloned();
        }
    }

    records.sort_by(|a, b| by_name(&a.name, &a.id, &b.name, &b.id));
    tracing::info!(records = records.len(), "assembled");
    Ok(records)
}

/// Read every `*.json` extraction file in `dir` and assemble.
pub fn assemble_dir(
    dir: &Path,
    alternatives: Option<&Alternatives>,
) -> Result<Vec<FinalRecord>, MergeError> {
    let mut files = Vec::new();
    for path in json_files(dir)? {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        // fail on the name before parsing the content
        if LinkField::from_file_stem(&stem).is_none() {
            return Err(MergeError::UnknownExtractionFileMapping {
                file: path.display().to_string(),
            });
        }
        let entries: Vec<FlaggedEntry> = read_json(&path)?;
        files.push((stem, entries));
    }
    assemble(&files, alternatives)
}
