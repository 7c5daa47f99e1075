//! `pmerge review|triage|alternatives`: operator review of the merged file.
//!
//! Override keys are entity names before any rename, so review always
//! reads the merged file rather than the patched one.

use std::path::PathBuf;

use presence_merge::assemble::{load_alternatives, Alternatives};
use presence_merge::io::read_json;
use presence_merge::review::{missing_alternatives, progress_bar, review_queue, review_stats, ReviewStats};
use presence_merge::{Pipeline, ScrapedRecord};
use serde::Serialize;

use crate::{open_pipeline, print_json, CliError};

const BAR_WIDTH: usize = 30;

fn load_merged(pipeline: &Pipeline) -> Result<Vec<ScrapedRecord>, CliError> {
    let path = &pipeline.paths().merged;
    if !path.exists() {
        return Err(CliError::usage(format!("merged file not found: {}", path.display()))
            .with_hint("run `pmerge merge` first"));
    }
    Ok(read_json(path)?)
}

#[derive(Serialize)]
struct QueueEntry<'a> {
    id: &'a str,
    name: &'a str,
    reasons: Vec<&'a str>,
    #[serde(rename = "cbRank", skip_serializing_if = "Option::is_none")]
    cb_rank: Option<&'a str>,
}

impl<'a> From<&'a ScrapedRecord> for QueueEntry<'a> {
    fn from(r: &'a ScrapedRecord) -> Self {
        Self {
            id: &r.id,
            name: &r.name,
            reasons: r.reasons.iter().collect(),
            cb_rank: r.cb_rank.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct ReviewOutput<'a> {
    stats: ReviewStats,
    queue: Vec<QueueEntry<'a>>,
}

pub fn cmd_review(config: PathBuf, json: bool, limit: usize) -> Result<(), CliError> {
    let pipeline = open_pipeline(&config)?;
    let records = load_merged(&pipeline)?;
    let overrides = pipeline.load_overrides()?;

    let stats = review_stats(&records, &overrides);
    let queue: Vec<QueueEntry> = review_queue(&records, &overrides)
        .into_iter()
        .take(limit)
        .map(QueueEntry::from)
        .collect();

    if json {
        return print_json(&ReviewOutput { stats, queue });
    }

    println!("Overall  {}", progress_bar(stats.processed, stats.total, BAR_WIDTH));
    println!("h        {}", progress_bar(stats.h.processed, stats.h.total, BAR_WIDTH));
    println!("f        {}", progress_bar(stats.f.processed, stats.f.total, BAR_WIDTH));
    println!("other    {}", progress_bar(stats.other.processed, stats.other.total, BAR_WIDTH));
    println!(
        "remaining: {} h, {} f, {} other",
        stats.h.remaining(),
        stats.f.remaining(),
        stats.other.remaining()
    );

    if queue.is_empty() {
        println!("\nnothing left to review");
        return Ok(());
    }
    println!("\nnext {}:", queue.len());
    for entry in &queue {
        println!(
            "  [{}] {:<40} rank {}",
            entry.reasons.join(","),
            entry.name,
            entry.cb_rank.unwrap_or("-"),
        );
    }
    Ok(())
}

pub fn cmd_triage(config: PathBuf, name: String, urls: Vec<String>, done: bool) -> Result<(), CliError> {
    if urls.is_empty() && !done {
        return Err(CliError::usage("nothing to record").with_hint("pass --url and/or --done"));
    }
    let pipeline = open_pipeline(&config)?;
    let merged_path = &pipeline.paths().merged;
    if merged_path.exists() {
        let records: Vec<ScrapedRecord> = read_json(merged_path)?;
        if !records.iter().any(|r| r.name == name) {
            tracing::warn!(name = %name, "no merged record has this name; the patch will not apply");
        }
    }

    let mut table = pipeline.load_overrides()?;
    let outcome = table.triage(&name, &urls);
    if done {
        table.mark_processed(&name);
    }
    table.save(&pipeline.paths().overrides)?;

    for (field, url) in &outcome.assigned {
        eprintln!("  {field} {url}");
    }
    for url in &outcome.discarded {
        eprintln!("  -   {url} (discarded)");
    }
    for url in &outcome.unclassified {
        eprintln!("  ?   {url} (kept for manual review)");
    }
    eprintln!(
        "'{}': {} assigned, {} discarded, {} unclassified{}",
        name,
        outcome.assigned.len(),
        outcome.discarded.len(),
        outcome.unclassified.len(),
        if done { ", marked processed" } else { "" },
    );
    Ok(())
}

pub fn cmd_alternatives(config: PathBuf, top: usize) -> Result<(), CliError> {
    let pipeline = open_pipeline(&config)?;
    let records = load_merged(&pipeline)?;
    let alternatives: Alternatives = match &pipeline.paths().alternatives {
        Some(path) if path.exists() => load_alternatives(path)?,
        _ => Alternatives::new(),
    };

    let missing = missing_alternatives(&records, &alternatives, top);
    if missing.is_empty() {
        eprintln!("top {top} ranked entities all have alternatives");
        return Ok(());
    }
    for r in &missing {
        println!("{}\t{}\t{}", r.cb_rank.as_deref().unwrap_or("-"), r.id, r.name);
    }
    eprintln!("{} of top {top} missing alternatives", missing.len());
    Ok(())
}
