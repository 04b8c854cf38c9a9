use crate::esmp::identity::normalize_name;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::debug;

const HOUSEKEEPING_FILES: [&str; 4] = [".DS_Store", "Thumbs.db", "desktop.ini", "Icon\r"];

pub fn is_housekeeping(file_name: &str) -> bool {
    file_name.starts_with('.')
        || file_name.starts_with("~$")
        || HOUSEKEEPING_FILES.contains(&file_name)
}

pub fn base_name(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    if is_housekeeping(file_name) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    Some(normalize_name(stem))
}

/// Base name of `path` when it carries the asset extension (case-insensitive).
pub fn tracked_name(path: &Path, extension: &str) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    if !ext.eq_ignore_ascii_case(extension.trim_start_matches('.')) {
        return None;
    }
    base_name(path)
}

pub fn list_base_names(dir: &Path, extension: &str) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match tracked_name(&path, extension) {
            Some(name) => names.push(name),
            None => debug!(file = %path.display(), "not a tracked file; skipping"),
        }
    }

    names.sort();
    Ok(names)
}
