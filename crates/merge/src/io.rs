//! JSON file hand-off between stages.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::MergeError;

/// Read and deserialize a whole JSON file. Parse failures are reported as
/// schema violations against the file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, MergeError> {
    let content = fs::read_to_string(path).map_err(|e| MergeError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| MergeError::SchemaViolation {
        file: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Write `value` as pretty JSON. The file is written to a temp file in the
/// target directory and renamed into place, so readers never see a partial
/// file.
pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), MergeError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| MergeError::io(dir, e))?;

    let mut json = serde_json::to_string_pretty(value).map_err(|e| MergeError::io(path, e))?;
    json.push('\n');

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| MergeError::io(dir, e))?;
    tmp.write_all(json.as_bytes())
        .map_err(|e| MergeError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| MergeError::io(path, e.error))?;
    Ok(())
}

/// `*.json` files directly inside `dir`, sorted by file name.
pub fn json_files(dir: &Path) -> Result<Vec<std::path::PathBuf>, MergeError> {
    let entries = fs::read_dir(dir).map_err(|e| MergeError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| MergeError::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
