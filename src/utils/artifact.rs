//! Local file resolution with glob pattern support.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Resolve a literal path or glob pattern to every matching regular file.
///
/// - Paths without glob chars (`*`, `?`, `[`, `]`) must exist as a file
/// - Globs expand to all matching files, sorted by path
/// - Zero matches is an error
pub fn resolve_files(pattern: &str) -> Result<Vec<PathBuf>> {
    if !contains_glob_chars(pattern) {
        let path = PathBuf::from(pattern);
        if path.is_file() {
            return Ok(vec![path]);
        }
        return Err(Error::transfer_failed(
            pattern,
            "",
            format!("No such file: {}", pattern),
        ));
    }

    let mut entries: Vec<PathBuf> = glob::glob(pattern)
        .map_err(|e| {
            Error::validation_invalid_argument(
                "pattern",
                format!("Invalid glob pattern '{}': {}", pattern, e),
                Some(pattern.to_string()),
                None,
            )
        })?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();

    if entries.is_empty() {
        return Err(Error::transfer_failed(
            pattern,
            "",
            format!("No files match pattern: {}", pattern),
        ));
    }

    entries.sort();
    Ok(entries)
}

/// List regular files directly inside `dir`, sorted by name.
///
/// A missing directory yields an empty list.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let read = std::fs::read_dir(dir).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("list {}", dir.display())))
    })?;

    let mut files: Vec<PathBuf> = read
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

pub fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::validation_invalid_argument(
                "path",
                "Path must include a file name",
                Some(path.display().to_string()),
                None,
            )
        })
}

fn contains_glob_chars(s: &str) -> bool {
    s.contains('*') || s.contains('?') || s.contains('[') || s.contains(']')
}
