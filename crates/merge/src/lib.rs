//! `presence-merge`: company record dedup, override and assembly engine.
//!
//! Pure engine crate: every stage loads its complete input, computes its
//! complete output in memory and hands back typed results. File hand-off
//! between stages lives in [`pipeline`]; the CLI crate only wires stages to
//! subcommands.

pub mod assemble;
pub mod config;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod io;
pub mod model;
pub mod normalize;
pub mod overrides;
pub mod pipeline;
pub mod report;
pub mod review;
pub mod rules;
pub mod static_source;

pub use config::PipelineConfig;
pub use error::MergeError;
pub use model::{FinalRecord, FlaggedEntry, LinkField, Reasons, ScrapedRecord};
pub use overrides::{OverridePatch, OverrideTable};
pub use pipeline::{Pipeline, RunReport};
pub use report::{Warning, WarningKind, Warnings};
pub use rules::{classify, extract_selector, Classification, Selector};
