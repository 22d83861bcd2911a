//! File utility functions for listing and filtering files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Returns paths to all files in a directory matching the given extensions,
/// sorted by file name. Extensions are matched case-insensitively and may be
/// given with or without a leading dot.
///
/// A missing directory yields an empty list.
pub fn files_with_extensions(dir: &Path, extensions: &[&str]) -> io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let wanted: Vec<String> = extensions
        .iter()
        .map(|ext| ext.trim_start_matches('.').to_lowercase())
        .collect();

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        if wanted.iter().any(|w| *w == ext.to_lowercase()) {
            files.push(path);
        }
    }
    files.sort();

    Ok(files)
}

/// Returns the file stem as an owned string, or `"image"` when it has none.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}
