//! Savepatch: declarative numeric patching for text save-state files
//!
//! Patches numeric fields inside externally-produced save files, guided by a
//! JSON directive set, and keeps a recoverable snapshot of every file it
//! touches. Save content is opaque text; the only structure this crate
//! understands is lines and the first numeric token on a line.
//!
//! # Architecture
//!
//! A directive set maps base names ("chapters") to line-number → value edits.
//! [`locate::locate`] finds the save files matching `{base}_{digits}`,
//! [`rewrite::apply`] performs the single-line numeric rewrite, and
//! [`backup::BackupStore`] / [`backup::RestoreEngine`] form the safety net
//! around the mutation. [`patcher::Patcher`] drives the whole run and
//! isolates failures at file granularity.
//!
//! # Safety
//!
//! - A snapshot is written and verified before the first byte of a save file
//!   is mutated
//! - Save files are persisted atomically (tempfile + fsync + rename)
//! - Restoration goes through a transient `.temp` side-file
//! - One file's failure never aborts its group or the run
//!
//! Execution is single-threaded and synchronous. The crate assumes
//! exclusive, uncontended access to the save directory; another process
//! holding a save open surfaces as an ordinary per-file I/O failure.
//!
//! # Example
//!
//! ```no_run
//! use savepatch::{load_from_path, BackupPolicy, Patcher};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let directives = load_from_path("savepatch.json")?;
//! let save_dir = directives.resolve_save_dir(std::path::Path::new("."));
//!
//! let patcher = Patcher::new(save_dir, BackupPolicy::UniqueVersioned);
//! let report = patcher.apply(&directives);
//! println!("{} line(s) rewritten", report.summary().lines_rewritten);
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod directive;
pub mod locate;
pub mod patcher;
pub mod rewrite;

// Re-exports
pub use backup::{
    discover_backups, BackupError, BackupPolicy, BackupStore, RestoreEngine, RestoreOutcome,
    BACKUP_SUFFIX, TEMP_SUFFIX,
};
pub use directive::{
    load_from_path, load_from_str, DirectiveError, DirectiveGroup, DirectiveSet, LineEdit,
    Settings, TargetValue, ValidationError, ValidationIssue,
};
pub use locate::locate;
pub use patcher::{
    FilePatch, FileReport, GroupReport, LineOutcome, LineReport, ModifyReport, OperatorPrompt,
    PatchError, Patcher, RestoreReport, RunSummary, SourceFallback,
};
pub use rewrite::RewriteOutcome;
