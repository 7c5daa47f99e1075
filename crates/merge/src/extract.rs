//! Per-network selector extraction from patched records.

use std::collections::HashMap;

use crate::config::WebsiteRules;
use crate::model::{by_name, FlaggedEntry, LinkField, ScrapedRecord};
use crate::normalize::website_domain;
use crate::report::{WarningKind, Warnings};
use crate::rules::{extract_selector, Selector};

/// Extraction output for one network, sorted by name then id.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkFile {
    pub field: LinkField,
    pub entries: Vec<FlaggedEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractOutput {
    /// One file per network, in `LinkField::ALL` order.
    pub files: Vec<NetworkFile>,
    pub warnings: Warnings,
}

impl ExtractOutput {
    pub fn entries(&self, field: LinkField) -> &[FlaggedEntry] {
        self.files
            .iter()
            .find(|f| f.field == field)
            .map(|f| f.entries.as_slice())
            .unwrap_or_default()
    }
}

pub fn sort_entries(entries: &mut [FlaggedEntry]) {
    entries.sort_by(|a, b| by_name(&a.name, &a.id, &b.name, &b.id));
}

fn merge_entry(existing: &mut FlaggedEntry, incoming: &FlaggedEntry) {
    existing.reasons.union(&incoming.reasons);
    if existing.stock_symbol.is_none() {
        existing.stock_symbol.clone_from(&incoming.stock_symbol);
    }
}

/// Website domains. Excluded domains are dropped; records sharing a domain
/// collapse into the first one with reasons unioned.
pub fn extract_websites(
    records: &[ScrapedRecord],
    rules: &WebsiteRules,
    warnings: &mut Warnings,
) -> Vec<FlaggedEntry> {
    let mut entries: Vec<FlaggedEntry> = Vec::new();
    let mut by_domain: HashMap<String, usize> = HashMap::new();

    for record in records {
        let Some(ws) = record.ws.as_deref() else {
            continue;
        };
        let domain = website_domain(ws);
        if domain.is_empty() {
            continue;
        }

        if let Some(pattern) = rules.exclusion_for(&domain) {
            if rules.exclude_suffixes.iter().any(|s| s == pattern) {
                tracing::debug!(%domain, pattern, "website excluded");
            } else {
                warnings.push(
                    WarningKind::ExcludedWebsite,
                    record.name.clone(),
                    format!("{ws} => {domain} (matches {pattern})"),
                );
            }
            continue;
        }

        let entry = FlaggedEntry::from_record(record, domain.clone());
        match by_domain.get(&domain) {
            Some(&i) => {
                warnings.push(
                    WarningKind::DuplicateKeyCollision,
                    record.name.clone(),
                    format!("domain {domain} already flagged for {} ({})", entries[i].name, entries[i].id),
                );
                merge_entry(&mut entries[i], &entry);
            }
            None => {
                by_domain.insert(domain, entries.len());
                entries.push(entry);
            }
        }
    }

    sort_entries(&mut entries);
    entries
}

/// Selectors for one social network. The first record to claim a
/// selector keeps it.
pub fn extract_network(
    records: &[ScrapedRecord],
    field: LinkField,
    warnings: &mut Warnings,
) -> Vec<FlaggedEntry> {
    let mut entries: Vec<FlaggedEntry> = Vec::new();
    let mut claimed: HashMap<String, usize> = HashMap::new();

    for record in records {
        let Some(url) = record.link(field) else {
            continue;
        };

        match extract_selector(url, field) {
            Some(Selector::Entity(selector)) => {
                if let Some(&i) = claimed.get(&selector) {
                    warnings.push(
                        WarningKind::DuplicateKeyCollision,
                        record.name.clone(),
                        format!(
                            "{field} {selector} already flagged for {} ({})",
                            entries[i].name, entries[i].id
                        ),
                    );
                    continue;
                }
                claimed.insert(selector.clone(), entries.len());
                entries.push(FlaggedEntry::from_record(record, selector));
            }
            Some(Selector::Generic(path)) => {
                tracing::debug!(%field, name = %record.name, path = %path, "generic path dropped");
            }
            None if field == LinkField::Li && (url.contains("/company-beta/") || url.contains("/in/")) => {}
            None => warnings.push(
                WarningKind::Unmatched,
                record.name.clone(),
                format!("{} link {url} had no match", field.label()),
            ),
        }
    }

    sort_entries(&mut entries);
    entries
}

/// Run every network's extraction.
pub fn extract_all(records: &[ScrapedRecord], rules: &WebsiteRules) -> ExtractOutput {
    let mut warnings = Warnings::default();
    let files = LinkField::ALL
        .into_iter()
        .map(|field| {
            let entries = match field {
                LinkField::Ws => extract_websites(records, rules, &mut warnings),
                _ => extract_network(records, field, &mut warnings),
            };
            tracing::info!(network = %field, entries = entries.len(), "extracted");
            NetworkFile { field, entries }
        })
        .collect();

    ExtractOutput { files, warnings }
}
