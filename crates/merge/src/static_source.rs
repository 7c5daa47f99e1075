//! Hand-maintained company lists turned into scrape-shaped records.
//!
//! Two list shapes are accepted:
//!
//! - entity lists: `{name, reasons, ws: [..], li?: [..], ...}`, one record
//!   per (entity, link) pair with id `s_{field}_{name}_{index}`;
//! - relation lists: `{name, link, relation}` triples, where only the
//!   accepted relation with a non-null link becomes a record.

use std::path::Path;

use serde::Deserialize;

use crate::config::{ReasonsConfig, StaticSourceConfig};
use crate::error::MergeError;
use crate::ingest::{validate_batch, Batch};
use crate::io::{json_files, read_json};
use crate::model::{LinkField, Reasons, ScrapedRecord};
use crate::report::{WarningKind, Warnings};

#[derive(Debug, Clone, Deserialize)]
pub struct StaticEntity {
    pub name: String,
    pub reasons: Reasons,
    pub ws: Vec<String>,
    #[serde(default)]
    pub li: Vec<String>,
    #[serde(default)]
    pub fb: Vec<String>,
    #[serde(default)]
    pub tw: Vec<String>,
    #[serde(default)]
    pub ig: Vec<String>,
    #[serde(default)]
    pub gh: Vec<String>,
    #[serde(default)]
    pub ytp: Vec<String>,
    #[serde(default)]
    pub ytc: Vec<String>,
    #[serde(default)]
    pub tt: Vec<String>,
    #[serde(default)]
    pub th: Vec<String>,
}

impl StaticEntity {
    fn links(&self, field: LinkField) -> &[String] {
        match field {
            LinkField::Ws => &self.ws,
            LinkField::Li => &self.li,
            LinkField::Fb => &self.fb,
            LinkField::Tw => &self.tw,
            LinkField::Ig => &self.ig,
            LinkField::Gh => &self.gh,
            LinkField::Ytp => &self.ytp,
            LinkField::Ytc => &self.ytc,
            LinkField::Tt => &self.tt,
            LinkField::Th => &self.th,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelationEntry {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Link", default)]
    pub link: Option<String>,
    #[serde(alias = "IsraelRelation")]
    pub relation: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StaticList {
    Entities(Vec<StaticEntity>),
    Relations(Vec<RelationEntry>),
}

pub fn expand_entities(entities: &[StaticEntity]) -> Vec<ScrapedRecord> {
    let mut records = Vec::new();
    for entity in entities {
        for field in LinkField::ALL {
            for (index, link) in entity.links(field).iter().enumerate() {
                if link.trim().is_empty() {
                    continue;
                }
                let mut record = ScrapedRecord::new(
                    format!("s_{field}_{}_{index}", entity.name),
                    entity.name.clone(),
                    entity.reasons.clone(),
                );
                record.set_link(field, Some(link.clone()));
                records.push(record);
            }
        }
    }
    records
}

pub fn expand_relations(
    entries: &[RelationEntry],
    config: &StaticSourceConfig,
    warnings: &mut Warnings,
) -> Vec<ScrapedRecord> {
    let mut records = Vec::new();
    for entry in entries {
        if entry.relation != config.accepted_relation {
            tracing::debug!(name = %entry.name, relation = %entry.relation, "relation skipped");
            continue;
        }
        match entry.link.as_deref().filter(|l| !l.trim().is_empty()) {
            Some(link) => {
                let mut record = ScrapedRecord::new(
                    format!("{}_{}", config.relation_id_prefix, entry.name),
                    entry.name.clone(),
                    Reasons::new([config.relation_reason.as_str()]),
                );
                record.ws = Some(link.to_string());
                records.push(record);
            }
            None => warnings.push(
                WarningKind::SkippedStaticEntry,
                entry.name.clone(),
                format!("{} entry without a link", entry.relation),
            ),
        }
    }
    records
}

/// Every entity must list at least one website.
fn check_entities(source: &str, entities: &[StaticEntity]) -> Result<(), MergeError> {
    for (i, entity) in entities.iter().enumerate() {
        if entity.ws.iter().all(|ws| ws.trim().is_empty()) {
            return Err(MergeError::SchemaViolation {
                file: source.to_string(),
                message: format!("entity {i} ({}) has no website", entity.name),
            });
        }
    }
    Ok(())
}

/// Load every static list in `dir` into one batch, fed to the
/// deduplicator after the scraped batches.
pub fn load_static_dir(
    dir: &Path,
    config: &StaticSourceConfig,
    reasons: &ReasonsConfig,
    warnings: &mut Warnings,
) -> Result<Batch, MergeError> {
    let mut records = Vec::new();
    for path in json_files(dir)? {
        let list: StaticList = read_json(&path)?;
        let source = path.display().to_string();
        let expanded = match &list {
            StaticList::Entities(entities) => {
                check_entities(&source, entities)?;
                expand_entities(entities)
            }
            StaticList::Relations(entries) => expand_relations(entries, config, warnings),
        };
        tracing::info!(file = %source, records = expanded.len(), "loaded static list");
        records.extend(validate_batch(&source, expanded, reasons)?);
    }
    Ok(Batch {
        source: dir.display().to_string(),
        records,
    })
}
