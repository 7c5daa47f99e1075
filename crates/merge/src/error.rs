use thiserror::Error;

use crate::model::LinkField;

/// Fatal pipeline errors. Any of these stops the run before later stages
/// write output.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Input JSON failed record validation; the whole file is rejected.
    #[error("schema violation in {file}: {message}")]
    SchemaViolation { file: String, message: String },

    /// Patch key is neither a link field nor a populated base-record field.
    #[error("unknown override key \"{key}\" for {entity} (valid keys: {valid})")]
    AmbiguousOverrideKey {
        entity: String,
        key: String,
        valid: String,
    },

    /// Override value does not fit the field it targets.
    #[error("invalid override value for {entity}.{key}: {message}")]
    InvalidOverrideValue {
        entity: String,
        key: String,
        message: String,
    },

    /// Override URL does not match its declared network's pattern.
    #[error("cannot extract {field} selector from {url} for {entity}")]
    UnextractableSelector {
        entity: String,
        field: LinkField,
        url: String,
    },

    /// Assembler was handed a file it cannot map to a network field.
    #[error("unknown extraction file: {file}")]
    UnknownExtractionFileMapping { file: String },

    /// TOML / JSON parse error in configuration.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Config validation error (empty path, duplicate entry, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    #[error("IO error on {path}: {message}")]
    Io { path: String, message: String },
}

impl MergeError {
    pub(crate) fn io(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}
