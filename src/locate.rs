//! Save-file discovery by structured name pattern.
//!
//! Candidate save files are named `{base}_{digits}` with no extension and no
//! other suffix. A coarse prefix scan over-matches (it would accept
//! `{base}_12x`), so every candidate is re-validated against the strict
//! digit-suffix rule before inclusion.

use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Find all candidate save files for `base_name` directly under `directory`.
///
/// A name qualifies when it is exactly `base_name`, an underscore, and one or
/// more decimal digits. Results are sorted so callers process files in a
/// deterministic order. An empty result is a normal condition, not an error.
pub fn locate(base_name: &str, directory: &Path) -> io::Result<Vec<String>> {
    let prefix = format!("{base_name}_");

    let mut files = Vec::new();
    for entry in WalkDir::new(directory).min_depth(1).max_depth(1) {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if is_candidate(name, &prefix) {
            files.push(name.to_string());
        }
    }

    files.sort();
    Ok(files)
}

/// Strict form check: `prefix` followed by one or more ASCII digits only.
fn is_candidate(name: &str, prefix: &str) -> bool {
    match name.strip_prefix(prefix) {
        Some(suffix) => !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) {
        fs::write(dir.path().join(name), b"0\n").unwrap();
    }

    #[test]
    fn test_strict_matching() {
        let dir = TempDir::new().unwrap();
        for name in ["B_1", "B_2", "B_10", "B_x", "Bx_3"] {
            touch(&dir, name);
        }

        let found = locate("B", dir.path()).unwrap();
        assert_eq!(found, vec!["B_1", "B_10", "B_2"]);
    }

    #[test]
    fn test_rejects_mixed_suffix() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "save_12x");
        touch(&dir, "save_12");
        touch(&dir, "save_");

        let found = locate("save", dir.path()).unwrap();
        assert_eq!(found, vec!["save_12"]);
    }

    #[test]
    fn test_rejects_backup_artifacts() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "save_1");
        touch(&dir, "save_1.backup");
        touch(&dir, "save_1.temp");

        let found = locate("save", dir.path()).unwrap();
        assert_eq!(found, vec!["save_1"]);
    }

    #[test]
    fn test_empty_when_nothing_matches() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "other_1");

        let found = locate("save", dir.path()).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_ignores_subdirectories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("save_3")).unwrap();
        touch(&dir, "save_2");

        let found = locate("save", dir.path()).unwrap();
        assert_eq!(found, vec!["save_2"]);
    }

    #[test]
    fn test_missing_directory_is_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");

        assert!(locate("save", &missing).is_err());
    }
}
