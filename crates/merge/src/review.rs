//! Operator review support: progress statistics and the order in which
//! unreviewed entities are presented.

use std::cmp::Ordering;

use serde::Serialize;

use crate::assemble::Alternatives;
use crate::model::{by_name, Reasons, ScrapedRecord};
use crate::overrides::OverrideTable;

/// `h` first, then `f`, then everything else (including no reasons).
pub fn reason_priority(reasons: &Reasons) -> u8 {
    if reasons.contains("h") {
        1
    } else if reasons.contains("f") {
        2
    } else {
        3
    }
}

/// Numeric rank with thousands separators stripped. Unparseable ranks
/// count as missing.
pub fn parse_rank(rank: Option<&str>) -> Option<u64> {
    rank?.replace(',', "").trim().parse().ok()
}

fn by_rank(a: &ScrapedRecord, b: &ScrapedRecord) -> Ordering {
    match (parse_rank(a.cb_rank.as_deref()), parse_rank(b.cb_rank.as_deref())) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReasonBucket {
    pub total: usize,
    pub processed: usize,
}

impl ReasonBucket {
    pub fn remaining(&self) -> usize {
        self.total - self.processed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReviewStats {
    pub total: usize,
    pub processed: usize,
    pub unprocessed: usize,
    pub h: ReasonBucket,
    pub f: ReasonBucket,
    pub other: ReasonBucket,
}

pub fn review_stats(records: &[ScrapedRecord], overrides: &OverrideTable) -> ReviewStats {
    let mut stats = ReviewStats {
        total: records.len(),
        ..Default::default()
    };

    for record in records {
        let processed = overrides.is_processed(&record.name);
        if processed {
            stats.processed += 1;
        } else {
            stats.unprocessed += 1;
        }

        let bucket = match reason_priority(&record.reasons) {
            1 => &mut stats.h,
            2 => &mut stats.f,
            _ => &mut stats.other,
        };
        bucket.total += 1;
        if processed {
            bucket.processed += 1;
        }
    }
    stats
}

/// Unreviewed records, most important first: reason priority, then
/// ascending rank (missing rank last), then name.
pub fn review_queue<'a>(
    records: &'a [ScrapedRecord],
    overrides: &OverrideTable,
) -> Vec<&'a ScrapedRecord> {
    let mut queue: Vec<_> = records
        .iter()
        .filter(|r| !overrides.is_processed(&r.name))
        .collect();
    queue.sort_by(|a, b| {
        reason_priority(&a.reasons)
            .cmp(&reason_priority(&b.reasons))
            .then_with(|| by_rank(a, b))
            .then_with(|| by_name(&a.name, &a.id, &b.name, &b.id))
    });
    queue
}

/// Of the `top_n` best-ranked `h` records, those without an alternatives
/// annotation.
pub fn missing_alternatives<'a>(
    records: &'a [ScrapedRecord],
    alternatives: &Alternatives,
    top_n: usize,
) -> Vec<&'a ScrapedRecord> {
    let mut top: Vec<_> = records
        .iter()
        .filter(|r| r.reasons.contains("h") && parse_rank(r.cb_rank.as_deref()).is_some())
        .collect();
    top.sort_by(|a, b| by_rank(a, b));
    top.truncate(top_n);
    top.retain(|r| !alternatives.contains_key(&r.id));
    top
}

/// `[████░░░░] 50.0% (2/4)`
pub fn progress_bar(current: usize, total: usize, width: usize) -> String {
    let percentage = if total > 0 {
        (current as f64 / total as f64 * 100.0).min(100.0)
    } else {
        0.0
    };
    let filled = ((percentage / 100.0) * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);
    format!(
        "[{}{}] {percentage:.1}% ({current}/{total})",
        "█".repeat(filled),
        "░".repeat(empty)
    )
}
