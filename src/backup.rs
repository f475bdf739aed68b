//! Backup and restore safety net around save-file mutation.
//!
//! A snapshot is taken before the first byte of a save file is mutated. Two
//! naming policies exist: unique-versioned backups accumulate (`.backup`,
//! `.backup1`, `.backup2`, first free index wins) and are never overwritten;
//! single-slot keeps only the most recent pre-mutation state in `.backup`.
//! Restoration always reads the `.backup` slot and goes through a transient
//! `.temp` side-file for crash safety.

use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;
use xxhash_rust::xxh3::xxh3_64;

/// Suffix for recoverable snapshots.
pub const BACKUP_SUFFIX: &str = ".backup";

/// Suffix for the transient pre-restore side-file.
pub const TEMP_SUFFIX: &str = ".temp";

/// Naming/overwrite strategy for pre-mutation snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackupPolicy {
    /// First free of `.backup`, `.backup1`, `.backup2`, ...; never overwrites.
    #[default]
    UniqueVersioned,
    /// Always `.backup`, silently overwritten on every snapshot.
    SingleSlot,
}

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot verification failed for {path}: written content does not match source")]
    SnapshotMismatch { path: PathBuf },
}

impl BackupError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BackupError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Creates recoverable snapshots of save files before mutation.
#[derive(Debug, Clone)]
pub struct BackupStore {
    directory: PathBuf,
    policy: BackupPolicy,
}

impl BackupStore {
    pub fn new(directory: impl Into<PathBuf>, policy: BackupPolicy) -> Self {
        Self {
            directory: directory.into(),
            policy,
        }
    }

    /// Snapshot the current content of `file_name` per the active policy.
    ///
    /// The source bytes are copied verbatim and the written snapshot is
    /// re-read and hash-compared against them before this returns. Exactly
    /// one snapshot file appears (unique-versioned) or is created-or-replaced
    /// (single-slot) per call.
    pub fn snapshot(&self, file_name: &str) -> Result<PathBuf, BackupError> {
        let source = self.directory.join(file_name);
        let content = fs::read(&source).map_err(|e| BackupError::io(&source, e))?;

        let destination = match self.policy {
            BackupPolicy::SingleSlot => self.directory.join(format!("{file_name}{BACKUP_SUFFIX}")),
            BackupPolicy::UniqueVersioned => self.versioned_destination(file_name),
        };

        fs::write(&destination, &content).map_err(|e| BackupError::io(&destination, e))?;

        let written = fs::read(&destination).map_err(|e| BackupError::io(&destination, e))?;
        if xxh3_64(&written) != xxh3_64(&content) {
            return Err(BackupError::SnapshotMismatch { path: destination });
        }

        Ok(destination)
    }

    /// First unused name in the `.backup`, `.backup1`, `.backup2`, ... series.
    fn versioned_destination(&self, file_name: &str) -> PathBuf {
        let mut destination = self.directory.join(format!("{file_name}{BACKUP_SUFFIX}"));
        let mut counter = 1u32;
        while destination.exists() {
            destination = self
                .directory
                .join(format!("{file_name}{BACKUP_SUFFIX}{counter}"));
            counter += 1;
        }
        destination
    }
}

/// Outcome of a single restore attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "RestoreOutcome should be checked for restored/missing"]
pub enum RestoreOutcome {
    /// Live file now matches the `.backup` snapshot byte-for-byte.
    Restored,
    /// No `.backup` exists for this file; nothing was touched.
    BackupMissing,
}

/// Reverses a mutation by copying the `.backup` snapshot back over the live
/// file.
#[derive(Debug, Clone)]
pub struct RestoreEngine {
    directory: PathBuf,
}

impl RestoreEngine {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Restore `file_name` from `{file_name}.backup`.
    ///
    /// If the live file exists it is first copied to `{file_name}.temp`; the
    /// side-file is deleted only after the overwrite succeeds. When the
    /// overwrite itself fails the side-file is intentionally left behind for
    /// operators to inspect.
    pub fn restore(&self, file_name: &str) -> Result<RestoreOutcome, BackupError> {
        let backup = self.directory.join(format!("{file_name}{BACKUP_SUFFIX}"));
        if !backup.exists() {
            return Ok(RestoreOutcome::BackupMissing);
        }

        let live = self.directory.join(file_name);

        let temp = if live.exists() {
            let temp = self.directory.join(format!("{file_name}{TEMP_SUFFIX}"));
            copy_preserving_mtime(&live, &temp)?;
            Some(temp)
        } else {
            None
        };

        copy_preserving_mtime(&backup, &live)?;

        if let Some(temp) = temp {
            fs::remove_file(&temp).map_err(|e| BackupError::io(&temp, e))?;
        }

        Ok(RestoreOutcome::Restored)
    }
}

/// Copy `from` over `to`, carrying the source's modification time along so a
/// restored save keeps the snapshot's timestamp.
fn copy_preserving_mtime(from: &Path, to: &Path) -> Result<(), BackupError> {
    fs::copy(from, to).map_err(|e| BackupError::io(to, e))?;

    let metadata = fs::metadata(from).map_err(|e| BackupError::io(from, e))?;
    let mtime = FileTime::from_last_modification_time(&metadata);
    filetime::set_file_mtime(to, mtime).map_err(|e| BackupError::io(to, e))?;

    Ok(())
}

/// List original file names for every `.backup` snapshot directly under
/// `directory`, sorted. Versioned overflow snapshots (`.backup1`, ...) are not
/// restore sources and are excluded.
pub fn discover_backups(directory: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in WalkDir::new(directory).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if let Some(original) = name.strip_suffix(BACKUP_SUFFIX) {
            if !original.is_empty() {
                names.push(original.to_string());
            }
        }
    }

    names.sort();
    Ok(names)
}
