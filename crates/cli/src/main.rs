mod exit_codes;
mod review;
mod stages;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use presence_merge::{MergeError, Pipeline};
use tracing_subscriber::EnvFilter;

use exit_codes::*;

#[derive(Parser)]
#[command(name = "pmerge")]
#[command(about = "Merge scraped company records into one deduplicated presence file")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Log stage progress (info level) to stderr; RUST_LOG overrides
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every stage: merge, patch, extract, assemble
    #[command(after_help = "\
Examples:
  pmerge run pipeline.toml
  pmerge run pipeline.toml --json
  pmerge run pipeline.toml --strict   # exit 40 if any warnings")]
    Run {
        /// Path to the pipeline TOML config
        config: PathBuf,

        /// Output the run report as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Fail with a distinct exit code when the run produced warnings
        #[arg(long)]
        strict: bool,
    },

    /// Deduplicate batches and static lists into the merged file
    #[command(after_help = "\
Examples:
  pmerge merge pipeline.toml
  pmerge merge pipeline.toml --json")]
    Merge {
        /// Path to the pipeline TOML config
        config: PathBuf,

        /// Output the stage report as JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Apply the override table to the merged file
    #[command(after_help = "\
Examples:
  pmerge patch pipeline.toml")]
    Patch {
        /// Path to the pipeline TOML config
        config: PathBuf,

        /// Output the stage report as JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Write one extraction file per network from the patched file
    #[command(after_help = "\
Examples:
  pmerge extract pipeline.toml")]
    Extract {
        /// Path to the pipeline TOML config
        config: PathBuf,

        /// Output the stage report as JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Join the extraction files into the final output
    #[command(after_help = "\
Examples:
  pmerge assemble pipeline.toml")]
    Assemble {
        /// Path to the pipeline TOML config
        config: PathBuf,

        /// Output the stage report as JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Validate a pipeline config without running
    #[command(after_help = "\
Examples:
  pmerge validate pipeline.toml")]
    Validate {
        /// Path to the pipeline TOML config
        config: PathBuf,
    },

    /// Show which network field a URL belongs to
    #[command(after_help = "\
Examples:
  pmerge classify https://www.linkedin.com/company/acme
  pmerge classify https://twitter.com/search https://acme.com --json")]
    Classify {
        /// URLs to classify
        #[arg(required = true)]
        urls: Vec<String>,

        /// Output one JSON array to stdout
        #[arg(long)]
        json: bool,
    },

    /// Show review progress and the next entities to review
    #[command(after_help = "\
Examples:
  pmerge review pipeline.toml
  pmerge review pipeline.toml --limit 50
  pmerge review pipeline.toml --json")]
    Review {
        /// Path to the pipeline TOML config
        config: PathBuf,

        /// Output stats and queue as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Number of queue entries to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Record URLs found for an entity in the override table
    #[command(after_help = "\
Examples:
  pmerge triage pipeline.toml \"Acme\" --url https://twitter.com/acme
  pmerge triage pipeline.toml \"Acme\" --url https://acme.io --url https://github.com/acme --done
  pmerge triage pipeline.toml \"Beta Systems\" --done")]
    Triage {
        /// Path to the pipeline TOML config
        config: PathBuf,

        /// Entity name as it appears in the merged file
        name: String,

        /// URL to route into the entity's patch (repeatable)
        #[arg(long = "url")]
        urls: Vec<String>,

        /// Mark the entity reviewed
        #[arg(long)]
        done: bool,
    },

    /// List top-ranked entities that still lack an alternatives entry
    #[command(after_help = "\
Examples:
  pmerge alternatives pipeline.toml
  pmerge alternatives pipeline.toml --top 25")]
    Alternatives {
        /// Path to the pipeline TOML config
        config: PathBuf,

        /// How many of the best-ranked entities to consider
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  presence-merge ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  presence-merge ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "presence_merge=info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run { config, json, strict } => stages::cmd_run(config, json, strict),
        Commands::Merge { config, json } => stages::cmd_stage(config, stages::StageArg::Merge, json),
        Commands::Patch { config, json } => stages::cmd_stage(config, stages::StageArg::Patch, json),
        Commands::Extract { config, json } => {
            stages::cmd_stage(config, stages::StageArg::Extract, json)
        }
        Commands::Assemble { config, json } => {
            stages::cmd_stage(config, stages::StageArg::Assemble, json)
        }
        Commands::Validate { config } => stages::cmd_validate(config),
        Commands::Classify { urls, json } => stages::cmd_classify(urls, json),
        Commands::Review { config, json, limit } => review::cmd_review(config, json, limit),
        Commands::Triage { config, name, urls, done } => review::cmd_triage(config, name, urls, done),
        Commands::Alternatives { config, top } => review::cmd_alternatives(config, top),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<MergeError> for CliError {
    fn from(err: MergeError) -> Self {
        let code = merge_exit_code(&err);
        let hint = match &err {
            MergeError::AmbiguousOverrideKey { .. } => {
                Some("fix the key in the override table, then rerun from `pmerge patch`".to_string())
            }
            MergeError::UnextractableSelector { field, .. } => Some(format!(
                "check the URL with `pmerge classify`; it must be a {} entity link",
                field.label()
            )),
            MergeError::UnknownExtractionFileMapping { .. } => {
                Some("remove stray files from the networks directory".to_string())
            }
            MergeError::SchemaViolation { .. } => {
                Some("no output was written; fix the file and rerun".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }
}

/// Load a pipeline from its config file.
pub(crate) fn open_pipeline(config: &std::path::Path) -> Result<Pipeline, CliError> {
    if !config.exists() {
        return Err(CliError::usage(format!("config not found: {}", config.display())));
    }
    Ok(Pipeline::from_config_file(config)?)
}

/// Print `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::other(format!("JSON serialization error: {e}")))?;
    println!("{json}");
    Ok(())
}
