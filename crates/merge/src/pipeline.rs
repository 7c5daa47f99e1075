//! File-to-file stage runner.
//!
//! Each stage reads its complete input, computes in memory and writes its
//! output once, atomically. A failing stage writes nothing, so later stages
//! never see partial output.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::assemble::{assemble_dir, load_alternatives};
use crate::config::PipelineConfig;
use crate::dedup::dedup;
use crate::error::MergeError;
use crate::extract::extract_all;
use crate::ingest::load_batch_dir;
use crate::io::{json_files, read_json, write_json_pretty};
use crate::model::ScrapedRecord;
use crate::overrides::{apply_overrides, OverrideTable};
use crate::report::{Warning, WarningKind, Warnings};
use crate::static_source::load_static_dir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Merge,
    Patch,
    Extract,
    Assemble,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merge => write!(f, "merge"),
            Self::Patch => write!(f, "patch"),
            Self::Extract => write!(f, "extract"),
            Self::Assemble => write!(f, "assemble"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    /// Items read: records, or network files for `assemble`.
    pub input: usize,
    /// Records or extraction entries written.
    pub output: usize,
    pub output_path: String,
    pub warnings: Warnings,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: DateTime<Utc>,
    pub stages: Vec<StageReport>,
}

impl RunReport {
    pub fn warnings(&self) -> impl Iterator<Item = &Warning> {
        self.stages.iter().flat_map(|s| s.warnings.iter())
    }

    pub fn warning_summary(&self) -> BTreeMap<WarningKind, usize> {
        let mut all = Warnings::default();
        for stage in &self.stages {
            all.extend(stage.warnings.clone());
        }
        all.summary()
    }
}

/// Resolved file layout of one pipeline.
#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub batches: PathBuf,
    pub static_lists: Option<PathBuf>,
    pub overrides: PathBuf,
    pub alternatives: Option<PathBuf>,
    pub merged: PathBuf,
    pub patched: PathBuf,
    pub networks: PathBuf,
    pub final_output: PathBuf,
}

pub struct Pipeline {
    config: PipelineConfig,
    paths: ResolvedPaths,
}

fn resolve(base: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

impl Pipeline {
    /// Paths in `config` are resolved against `base_dir`, normally the
    /// config file's directory.
    pub fn new(config: PipelineConfig, base_dir: impl AsRef<Path>) -> Self {
        let base = base_dir.as_ref();
        let p = &config.paths;
        let paths = ResolvedPaths {
            batches: resolve(base, &p.batches),
            static_lists: p.static_lists.as_deref().map(|s| resolve(base, s)),
            overrides: resolve(base, &p.overrides),
            alternatives: p.alternatives.as_deref().map(|s| resolve(base, s)),
            merged: resolve(base, &p.merged),
            patched: resolve(base, &p.patched),
            networks: resolve(base, &p.networks),
            final_output: resolve(base, &p.final_output),
        };
        Self { config, paths }
    }

    /// Load a TOML config file and resolve paths against its directory.
    pub fn from_config_file(path: &Path) -> Result<Self, MergeError> {
        let content = fs::read_to_string(path).map_err(|e| MergeError::io(path, e))?;
        let config = PipelineConfig::from_toml(&content)?;
        let base = path.parent().unwrap_or(Path::new("."));
        Ok(Self::new(config, base))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn paths(&self) -> &ResolvedPaths {
        &self.paths
    }

    pub fn load_overrides(&self) -> Result<OverrideTable, MergeError> {
        OverrideTable::load(&self.paths.overrides)
    }

    pub fn load_patched(&self) -> Result<Vec<ScrapedRecord>, MergeError> {
        read_json(&self.paths.patched)
    }

    /// Ingest batches and static lists, deduplicate, write the merged file.
    pub fn merge(&self) -> Result<StageReport, MergeError> {
        let mut warnings = Warnings::default();
        let reasons = &self.config.reasons;
        let mut batches = load_batch_dir(&self.paths.batches, reasons)?;
        if let Some(dir) = &self.paths.static_lists {
            batches.push(load_static_dir(dir, &self.config.static_sources, reasons, &mut warnings)?);
        }
        let input = batches.iter().map(|b| b.records.len()).sum();

        let out = dedup(&batches, &self.config.dedup_rules());
        warnings.extend(out.warnings);

        write_json_pretty(&self.paths.merged, &out.records)?;
        tracing::info!(path = %self.paths.merged.display(), records = out.records.len(), "wrote merged");
        Ok(self.report(Stage::Merge, input, out.records.len(), &self.paths.merged, warnings))
    }

    /// Apply the override table to the merged file.
    pub fn patch(&self) -> Result<StageReport, MergeError> {
        let merged: Vec<ScrapedRecord> = read_json(&self.paths.merged)?;
        let input = merged.len();
        let table = self.load_overrides()?;

        let out = apply_overrides(merged, &table)?;

        write_json_pretty(&self.paths.patched, &out.records)?;
        tracing::info!(path = %self.paths.patched.display(), records = out.records.len(), "wrote patched");
        Ok(self.report(Stage::Patch, input, out.records.len(), &self.paths.patched, Warnings::default()))
    }

    /// Write one extraction file per network.
    pub fn extract(&self) -> Result<StageReport, MergeError> {
        let patched = self.load_patched()?;
        let out = extract_all(&patched, &self.config.websites);

        let mut written = 0;
        for file in &out.files {
            let path = self.paths.networks.join(format!("{}.json", file.field.file_stem()));
            write_json_pretty(&path, &file.entries)?;
            written += file.entries.len();
        }
        tracing::info!(dir = %self.paths.networks.display(), entries = written, "wrote network files");
        Ok(self.report(Stage::Extract, patched.len(), written, &self.paths.networks, out.warnings))
    }

    /// Join the network files into the final distribution file.
    pub fn assemble(&self) -> Result<StageReport, MergeError> {
        let alternatives = match &self.paths.alternatives {
            Some(path) => Some(load_alternatives(path)?),
            None => None,
        };
        let records = assemble_dir(&self.paths.networks, alternatives.as_ref())?;
        let input = json_files(&self.paths.networks)?.len();

        write_json_pretty(&self.paths.final_output, &records)?;
        tracing::info!(path = %self.paths.final_output.display(), records = records.len(), "wrote final");
        Ok(self.report(
            Stage::Assemble,
            input,
            records.len(),
            &self.paths.final_output,
            Warnings::default(),
        ))
    }

    /// Run every stage in order. The first fatal error stops the run.
    pub fn run_all(&self) -> Result<RunReport, MergeError> {
        let run_at = Utc::now();
        let stages = vec![self.merge()?, self.patch()?, self.extract()?, self.assemble()?];
        Ok(RunReport {
            config_name: self.config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at,
            stages,
        })
    }

    fn report(
        &self,
        stage: Stage,
        input: usize,
        output: usize,
        path: &Path,
        warnings: Warnings,
    ) -> StageReport {
        StageReport {
            stage,
            input,
            output,
            output_path: path.display().to_string(),
            warnings,
        }
    }
}
