use std::path::Path;

use crate::config::ReasonsConfig;
use crate::error::MergeError;
use crate::io::{json_files, read_json};
use crate::model::{LinkField, ScrapedRecord};
use crate::normalize::clean_link;

/// One raw batch file, in read order.
#[derive(Debug, Clone)]
pub struct Batch {
    /// File name the records came from.
    pub source: String,
    pub records: Vec<ScrapedRecord>,
}

/// Load and validate one batch file. Any bad record rejects the file.
pub fn load_batch(path: &Path, reasons: &ReasonsConfig) -> Result<Batch, MergeError> {
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let records: Vec<ScrapedRecord> = read_json(path)?;
    let records = validate_batch(&source, records, reasons)?;

    tracing::info!(file = %source, records = records.len(), "loaded batch");
    Ok(Batch { source, records })
}

/// Load every `*.json` batch in `dir`, sorted by file name.
pub fn load_batch_dir(dir: &Path, reasons: &ReasonsConfig) -> Result<Vec<Batch>, MergeError> {
    json_files(dir)?.iter().map(|p| load_batch(p, reasons)).collect()
}

/// Check required fields and reason tags, then normalize link fields.
pub fn validate_batch(
    source: &str,
    records: Vec<ScrapedRecord>,
    reasons: &ReasonsConfig,
) -> Result<Vec<ScrapedRecord>, MergeError> {
    records
        .into_iter()
        .enumerate()
        .map(|(i, mut record)| {
            if record.id.trim().is_empty() {
                return Err(MergeError::SchemaViolation {
                    file: source.to_string(),
                    message: format!("record {i} has an empty id"),
                });
            }
            if record.name.trim().is_empty() {
                return Err(MergeError::SchemaViolation {
                    file: source.to_string(),
                    message: format!("record {i} ({}) has an empty name", record.id),
                });
            }
            if let Some(tag) = reasons.first_unknown(&record.reasons) {
                return Err(MergeError::SchemaViolation {
                    file: source.to_string(),
                    message: format!("record {i} ({}) has unknown reason '{tag}'", record.id),
                });
            }
            normalize_links(&mut record);
            Ok(record)
        })
        .collect()
}

pub(crate) fn normalize_links(record: &mut ScrapedRecord) {
    for field in LinkField::ALL {
        let slot = record.link_mut(field);
        if let Some(raw) = slot.take() {
            *slot = clean_link(&raw);
        }
    }
}
