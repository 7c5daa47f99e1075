//! CLI Exit Code Registry
//!
//! Single source of truth for `pmerge` exit codes. Scripts driving the
//! pipeline branch on these, so existing values never change meaning.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain     | Description                               |
//! |---------|------------|-------------------------------------------|
//! | 0       | Universal  | Success                                   |
//! | 1       | Universal  | General error (unspecified)               |
//! | 2       | Universal  | CLI usage error (bad args, missing file)  |
//! | 3-9     | config     | Pipeline config problems                  |
//! | 10-19   | input      | Batch / static list / data file problems  |
//! | 20-29   | overrides  | Override table problems                   |
//! | 30-39   | assembly   | Extraction file wiring problems           |
//! | 40-49   | run        | Run outcome codes                         |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Map it in `merge_exit_code` if it comes from the engine

use presence_merge::MergeError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing optional path in config.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Config (3-9)
// =============================================================================

/// Config file is not valid TOML or misses required keys.
pub const EXIT_CONFIG_PARSE: u8 = 3;

/// Config parsed but failed validation (empty path, repeated entry).
pub const EXIT_CONFIG_INVALID: u8 = 4;

// =============================================================================
// Input (10-19)
// =============================================================================

/// A batch or data file failed schema validation; the whole file is rejected.
pub const EXIT_SCHEMA_VIOLATION: u8 = 10;

/// Filesystem error reading or writing a pipeline file.
pub const EXIT_IO: u8 = 11;

// =============================================================================
// Overrides (20-29)
// =============================================================================

/// Patch key is neither a link field nor a populated record field.
pub const EXIT_OVERRIDE_KEY: u8 = 20;

/// Patch value does not fit the field it targets.
pub const EXIT_OVERRIDE_VALUE: u8 = 21;

/// Override URL does not match its network's pattern.
pub const EXIT_UNEXTRACTABLE_SELECTOR: u8 = 22;

// =============================================================================
// Assembly (30-39)
// =============================================================================

/// Networks directory holds a file that maps to no network field.
pub const EXIT_UNKNOWN_EXTRACTION_FILE: u8 = 30;

// =============================================================================
// Run (40-49)
// =============================================================================

/// Run completed but produced warnings, and `--strict` was given.
pub const EXIT_WARNINGS: u8 = 40;

/// Map an engine error to its exit code.
pub fn merge_exit_code(err: &MergeError) -> u8 {
    match err {
        MergeError::ConfigParse(_) => EXIT_CONFIG_PARSE,
        MergeError::ConfigValidation(_) => EXIT_CONFIG_INVALID,
        MergeError::SchemaViolation { .. } => EXIT_SCHEMA_VIOLATION,
        MergeError::Io { .. } => EXIT_IO,
        MergeError::AmbiguousOverrideKey { .. } => EXIT_OVERRIDE_KEY,
        MergeError::InvalidOverrideValue { .. } => EXIT_OVERRIDE_VALUE,
        MergeError::UnextractableSelector { .. } => EXIT_UNEXTRACTABLE_SELECTOR,
        MergeError::UnknownExtractionFileMapping { .. } => EXIT_UNKNOWN_EXTRACTION_FILE,
    }
}
