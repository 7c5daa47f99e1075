//! `pmerge run|merge|patch|extract|assemble|validate|classify`

use std::collections::BTreeMap;
use std::path::PathBuf;

use presence_merge::pipeline::StageReport;
use presence_merge::{classify, Classification, PipelineConfig, WarningKind};

use crate::exit_codes::EXIT_WARNINGS;
use crate::{open_pipeline, print_json, CliError};

#[derive(Debug, Clone, Copy)]
pub enum StageArg {
    Merge,
    Patch,
    Extract,
    Assemble,
}

pub fn cmd_run(config: PathBuf, json: bool, strict: bool) -> Result<(), CliError> {
    let pipeline = open_pipeline(&config)?;
    let report = pipeline.run_all()?;

    if json {
        print_json(&report)?;
    }

    eprintln!("pipeline '{}' (engine {})", report.config_name, report.engine_version);
    for stage in &report.stages {
        print_stage_line(stage);
    }
    let summary = report.warning_summary();
    print_warning_summary(&summary);

    let total: usize = summary.values().sum();
    if strict && total > 0 {
        return Err(CliError {
            code: EXIT_WARNINGS,
            message: format!("{total} warning(s) under --strict"),
            hint: Some("rerun with --json to list every warning".to_string()),
        });
    }
    Ok(())
}

pub fn cmd_stage(config: PathBuf, stage: StageArg, json: bool) -> Result<(), CliError> {
    let pipeline = open_pipeline(&config)?;
    let report = match stage {
        StageArg::Merge => pipeline.merge()?,
        StageArg::Patch => pipeline.patch()?,
        StageArg::Extract => pipeline.extract()?,
        StageArg::Assemble => pipeline.assemble()?,
    };

    if json {
        print_json(&report)?;
    }
    print_stage_line(&report);
    print_warning_summary(&report.warnings.summary());
    Ok(())
}

pub fn cmd_validate(config: PathBuf) -> Result<(), CliError> {
    let content = std::fs::read_to_string(&config)
        .map_err(|e| CliError::usage(format!("cannot read {}: {e}", config.display())))?;
    let parsed = PipelineConfig::from_toml(&content)?;
    eprintln!(
        "config '{}' ok: {} blacklisted id(s), {} blacklisted name(s), {} known duplicate(s)",
        parsed.name,
        parsed.blacklist.ids.len(),
        parsed.blacklist.names.len(),
        parsed.known_duplicates.len(),
    );
    Ok(())
}

#[derive(serde::Serialize)]
struct ClassifiedUrl<'a> {
    url: &'a str,
    #[serde(flatten)]
    classification: Classification,
}

pub fn cmd_classify(urls: Vec<String>, json: bool) -> Result<(), CliError> {
    let classified: Vec<_> = urls
        .iter()
        .map(|url| ClassifiedUrl {
            url,
            classification: classify(url),
        })
        .collect();

    if json {
        return print_json(&classified);
    }
    for c in &classified {
        match &c.classification {
            Classification::Network { field, selector } => {
                println!("{}\t{}\t{}", c.url, field, selector)
            }
            Classification::Discarded { reason } => println!("{}\t-\tdiscarded: {}", c.url, reason),
            Classification::Unclassified => println!("{}\t?\tunclassified", c.url),
        }
    }
    Ok(())
}

fn print_stage_line(stage: &StageReport) {
    eprintln!(
        "  {:<9} {:>6} in  {:>6} out  {:>4} warning(s)  -> {}",
        stage.stage.to_string(),
        stage.input,
        stage.output,
        stage.warnings.len(),
        stage.output_path,
    );
}

fn print_warning_summary(summary: &BTreeMap<WarningKind, usize>) {
    if summary.is_empty() {
        return;
    }
    let parts: Vec<String> = summary.iter().map(|(kind, n)| format!("{n} {kind}")).collect();
    eprintln!("warnings: {}", parts.join(", "));
}
