//! Weak-key deduplication.
//!
//! Records are folded in the order given: batches in file-name order, then
//! records in file order. The first record seen for an entity keeps every
//! non-empty value it has; later records only fill empty slots. This makes
//! the result order-dependent for conflicting values, and that order is
//! part of the contract.

use crate::config::DedupRules;
use crate::ingest::{normalize_links, Batch};
use crate::model::{sort_records, ScrapedRecord};
use crate::normalize::website_domain;
use crate::report::{WarningKind, Warnings};

#[derive(Debug, Clone, Default)]
pub struct DedupOutput {
    /// Sorted by name, then id.
    pub records: Vec<ScrapedRecord>,
    pub warnings: Warnings,
}

fn fill<T: Clone>(slot: &mut Option<T>, incoming: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(incoming);
    }
}

/// Merge `incoming` into `existing`: reasons are unioned, every other field
/// is written only when the existing slot is empty.
pub fn merge_records(existing: &mut ScrapedRecord, incoming: &ScrapedRecord) {
    existing.reasons.union(&incoming.reasons);

    if existing.name.is_empty() {
        existing.name.clone_from(&incoming.name);
    }
    for field in crate::model::LinkField::ALL {
        fill(existing.link_mut(field), &incoming.link(field).map(String::from));
    }

    fill(&mut existing.cb_link, &incoming.cb_link);
    fill(&mut existing.stock_symbol, &incoming.stock_symbol);
    fill(&mut existing.stock_exchange_symbol, &incoming.stock_exchange_symbol);
    fill(&mut existing.hq_postal_code, &incoming.hq_postal_code);
    fill(&mut existing.description, &incoming.description);
    fill(&mut existing.cb_rank, &incoming.cb_rank);
    fill(&mut existing.est_revenue, &incoming.est_revenue);
    fill(&mut existing.industries, &incoming.industries);
    fill(&mut existing.industry_groups, &incoming.industry_groups);
    fill(&mut existing.founder_ids, &incoming.founder_ids);
    fill(&mut existing.investor_ids, &incoming.investor_ids);
    fill(&mut existing.acquirer_ids, &incoming.acquirer_ids);
    fill(&mut existing.acquirer_identifier, &incoming.acquirer_identifier);
}

/// Same entity: identical source id or any shared non-empty weak key.
fn same_entity(a: &ScrapedRecord, b: &ScrapedRecord) -> bool {
    a.id == b.id || a.shared_weak_key(b).is_some()
}

fn describe_match(a: &ScrapedRecord, b: &ScrapedRecord) -> String {
    match a.shared_weak_key(b) {
        Some(field) => format!("{field} {}", a.link(field).unwrap_or_default()),
        None => format!("id {}", a.id),
    }
}

/// After `acc[at]` absorbed new values it may now match another record.
/// Fold every such record into the earlier of the pair until none is left.
fn fold_bridges(acc: &mut Vec<ScrapedRecord>, mut at: usize, warnings: &mut Warnings) {
    while let Some(other) = (0..acc.len()).find(|&j| j != at && same_entity(&acc[j], &acc[at])) {
        let (keep, drop) = if other < at { (other, at) } else { (at, other) };
        let dropped = acc.remove(drop);
        let key = describe_match(&acc[keep], &dropped);
        merge_records(&mut acc[keep], &dropped);
        warnings.push(
            WarningKind::DuplicateKeyCollision,
            acc[keep].name.clone(),
            format!("{key} also on {} ({}); folded into {}", dropped.name, dropped.id, acc[keep].id),
        );
        at = keep;
    }
}

fn is_blacklisted(record: &ScrapedRecord, rules: &DedupRules<'_>) -> bool {
    rules.blacklist.ids.iter().any(|id| *id == record.id)
        || rules.blacklist.names.iter().any(|name| *name == record.name)
}

/// Collapse records sharing a weak key across all batches.
pub fn dedup(batches: &[Batch], rules: &DedupRules<'_>) -> DedupOutput {
    let mut acc: Vec<ScrapedRecord> = Vec::new();
    let mut warnings = Warnings::default();
    let mut blacklisted = 0usize;

    for batch in batches {
        for record in &batch.records {
            if is_blacklisted(record, rules) {
                tracing::debug!(id = %record.id, name = %record.name, "blacklisted");
                blacklisted += 1;
                continue;
            }
            match acc.iter().position(|existing| same_entity(existing, record)) {
                Some(i) => {
                    tracing::debug!(
                        id = %record.id,
                        into = %acc[i].id,
                        key = %describe_match(&acc[i], record),
                        "merged"
                    );
                    merge_records(&mut acc[i], record);
                    fold_bridges(&mut acc, i, &mut warnings);
                }
                None => acc.push(record.clone()),
            }
        }
    }

    let removed = remove_known_duplicates(&mut acc, rules);
    sort_records(&mut acc);

    tracing::info!(
        records = acc.len(),
        blacklisted,
        known_duplicates_removed = removed,
        collisions = warnings.len(),
        "dedup complete"
    );
    DedupOutput {
        records: acc,
        warnings,
    }
}

fn remove_known_duplicates(acc: &mut Vec<ScrapedRecord>, rules: &DedupRules<'_>) -> usize {
    let before = acc.len();
    for dup in rules.known_duplicates {
        let domain = website_domain(&dup.website);
        acc.retain(|r| r.ws.as_deref().map(website_domain).as_deref() != Some(domain.as_str()));
    }
    let removed = before - acc.len();

    for dup in rules.known_duplicates {
        if let Some(replacement) = &dup.replacement {
            let mut record = replacement.clone();
            normalize_links(&mut record);
            acc.push(record);
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BlacklistConfig, KnownDuplicate};
    use crate::model::Reasons;

    fn rec(id: &str, name: &str, reasons: &[&str]) -> ScrapedRecord {
        ScrapedRecord::new(id, name, Reasons::new(reasons.iter().copied()))
    }

    fn batch(records: Vec<ScrapedRecord>) -> Vec<Batch> {
        vec![Batch {
            source: "batch.json".into(),
            records,
        }]
    }

    fn run(batches: &[Batch]) -> DedupOutput {
        let blacklist = BlacklistConfig::default();
        dedup(
            batches,
            &DedupRules {
                blacklist: &blacklist,
                known_duplicates: &[],
            },
        )
    }

    #[test]
    fn fill_not_overwrite() {
        let mut a = rec("A", "Acme", &["h"]);
        a.ws = Some("a.com".into());
        let mut b = rec("B", "Acme Ltd", &["f"]);
        b.ws = Some("a.com".into());
        b.li = Some("linkedin.com/company/x".into());
        let mut c = rec("C", "Acme Inc", &["b"]);
        c.ws = Some("a.com".into());
        c.li = Some("linkedin.com/company/y".into());

        let out = run(&batch(vec![a, b, c]));
        assert_eq!(out.records.len(), 1);
        let merged = &out.records[0];
        assert_eq!(merged.id, "A");
        assert_eq!(merged.name, "Acme");
        assert_eq!(merged.ws.as_deref(), Some("a.com"));
        assert_eq!(merged.li.as_deref(), Some("linkedin.com/company/x"));
        assert_eq!(merged.reasons.iter().collect::<Vec<_>>(), vec!["h", "f", "b"]);
    }

    #[test]
    fn reasons_union_on_shared_key() {
        let mut a = rec("A", "Acme", &["h", "f"]);
        a.tw = Some("x.com/acme".into());
        let mut b = rec("B", "Acme", &["f", "b"]);
        b.tw = Some("x.com/acme".into());

        let out = run(&batch(vec![a, b]));
        assert_eq!(out.records[0].reasons, Reasons::new(["h", "f", "b"]));
    }

    #[test]
    fn records_without_weak_keys_are_kept() {
        let mut a = rec("A", "Same Name", &[]);
        a.ig = Some("instagram.com/same".into());
        let mut b = rec("B", "Same Name", &[]);
        b.ig = Some("instagram.com/same".into());

        let out = run(&batch(vec![a, b]));
        assert_eq!(out.records.len(), 2);
    }

    #[test]
    fn same_source_id_merges() {
        let mut a = rec("A", "Acme", &["h"]);
        a.description = Some("first".into());
        let mut b = rec("A", "Acme", &["h"]);
        b.cb_rank = Some("1,234".into());

        let out = run(&batch(vec![a, b]));
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].description.as_deref(), Some("first"));
        assert_eq!(out.records[0].cb_rank.as_deref(), Some("1,234"));
    }

    #[test]
    fn bridge_record_folds_and_warns() {
        let mut a = rec("A", "Alpha", &["h"]);
        a.ws = Some("alpha.com".into());
        let mut b = rec("B", "Beta", &["f"]);
        b.li = Some("linkedin.com/company/beta".into());
        // matches A by website and carries B's LinkedIn
        let mut c = rec("C", "Gamma", &["b"]);
        c.ws = Some("alpha.com".into());
        c.li = Some("linkedin.com/company/beta".into());

        let out = run(&batch(vec![a, b, c]));
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].id, "A");
        assert_eq!(out.records[0].reasons, Reasons::new(["h", "b", "f"]));
        assert_eq!(out.warnings.of_kind(WarningKind::DuplicateKeyCollision).count(), 1);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut a = rec("A", "Alpha", &["h"]);
        a.ws = Some("alpha.com".into());
        let mut b = rec("B", "Beta", &["f"]);
        b.li = Some("linkedin.com/company/beta".into());
        let mut c = rec("C", "Gamma", &["b"]);
        c.ws = Some("alpha.com".into());
        c.li = Some("linkedin.com/company/beta".into());
        let mut d = rec("D", "Delta", &["h"]);
        d.fb = Some("facebook.com/delta".into());
        let e = rec("E", "Epsilon", &[]);

        let once = run(&batch(vec![a, b, c, d, e]));
        let twice = run(&batch(once.records.clone()));
        assert_eq!(once.records, twice.records);
        assert!(twice.warnings.is_empty());
    }

    #[test]
    fn blacklist_drops_before_merge() {
        let mut a = rec("corvid", "Corvid", &["h"]);
        a.ws = Some("corvid.com".into());
        let mut b = rec("B", "Corvid Two", &["f"]);
        b.ws = Some("corvid.com".into());
        let c = rec("C", "Red Alert", &["h"]);

        let blacklist = BlacklistConfig {
            ids: vec!["corvid".into()],
            names: vec!["Red Alert".into()],
        };
        let out = dedup(
            &batch(vec![a, b, c]),
            &DedupRules {
                blacklist: &blacklist,
                known_duplicates: &[],
            },
        );
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].id, "B");
        assert_eq!(out.records[0].reasons, Reasons::new(["f"]));
    }

    #[test]
    fn known_duplicate_website_is_replaced() {
        let mut a = rec("A", "Shared One", &["h"]);
        a.ws = Some("www.shared.com".into());
        let b = rec("B", "Other", &["f"]);
        let mut replacement = rec("shared", "Shared Group", &["h"]);
        replacement.ws = Some("https://shared.com/".into());

        let blacklist = BlacklistConfig::default();
        let dups = vec![KnownDuplicate {
            website: "shared.com".into(),
            replacement: Some(replacement),
        }];
        let out = dedup(
            &batch(vec![a, b]),
            &DedupRules {
                blacklist: &blacklist,
                known_duplicates: &dups,
            },
        );
        let ids: Vec<_> = out.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "shared"]);
        assert_eq!(out.records[1].ws.as_deref(), Some("shared.com"));
    }

    #[test]
    fn output_sorted_by_name_then_id() {
        let out = run(&batch(vec![
            rec("2", "beta", &[]),
            rec("3", "Alpha", &[]),
            rec("1", "beta", &[]),
        ]));
        let ids: Vec<_> = out.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
    }

    #[test]
    fn later_batches_fill_earlier_records() {
        let mut a = rec("A", "Acme", &["h"]);
        a.fb = Some("facebook.com/acme".into());
        let mut b = rec("B", "Acme", &["f"]);
        b.fb = Some("facebook.com/acme".into());
        b.stock_symbol = Some("ACM".into());

        let batches = vec![
            Batch {
                source: "1.json".into(),
                records: vec![a],
            },
            Batch {
                source: "2.json".into(),
                records: vec![b],
            },
        ];
        let out = run(&batches);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].id, "A");
        assert_eq!(out.records[0].stock_symbol.as_deref(), Some("ACM"));
    }
}
