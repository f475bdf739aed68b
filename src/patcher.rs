//! Patch orchestration: walks directive groups over located save files and
//! rewrites their configured lines, snapshotting before every mutation. Also
//! drives restore mode.
//!
//! Failures are isolated at file granularity: one unreadable or unwritable
//! save never aborts its group or the run. Only the directive source itself
//! failing to load is fatal, and that happens before this module is reached.

use crate::backup::{
    discover_backups, BackupError, BackupPolicy, BackupStore, RestoreEngine, RestoreOutcome,
};
use crate::directive::{DirectiveGroup, DirectiveSet, LineEdit};
use crate::locate::locate;
use crate::rewrite::{self, RewriteOutcome};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Operator interaction seam. The shipped implementation is a console
/// prompt; tests and embedders inject their own.
pub trait OperatorPrompt {
    /// Called when the directive source is absent: pick a replacement file,
    /// switch to restore mode, or give up.
    fn select_directive_source(&mut self) -> SourceFallback;

    /// Called with the discovered backup names before any restoration.
    /// Returns the operator's raw reply; only a literal `yes`
    /// (case-insensitive) proceeds.
    fn confirm_restore(&mut self, backups: &[String]) -> String;
}

/// Outcome of the missing-directive-source prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFallback {
    Selected(PathBuf),
    RestoreMode,
    Cancelled,
}

/// Per-file failure during a modify or restore loop.
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("failed to scan {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What happened to one configured line of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Rewritten { old: String, new: String },
    NoNumericToken,
    OutOfRange { line_count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineReport {
    pub line: usize,
    pub outcome: LineOutcome,
}

impl LineReport {
    pub fn rewritten(&self) -> bool {
        matches!(self.outcome, LineOutcome::Rewritten { .. })
    }
}

/// Result of processing a single save file.
#[derive(Debug, Clone)]
pub struct FilePatch {
    pub file: String,
    /// Snapshot path; `None` on read-only check runs.
    pub backup: Option<PathBuf>,
    pub lines: Vec<LineReport>,
    pub old_content: String,
    pub new_content: String,
    pub changed: bool,
}

#[derive(Debug)]
pub struct FileReport {
    pub file: String,
    pub result: Result<FilePatch, PatchError>,
}

#[derive(Debug)]
pub struct GroupReport {
    pub base_name: String,
    /// `Err` when the save directory could not be scanned for this group.
    pub files: Result<Vec<FileReport>, PatchError>,
}

/// Full modify-run (or check-run) report, one entry per directive group.
#[derive(Debug, Default)]
pub struct ModifyReport {
    pub groups: Vec<GroupReport>,
}

/// Aggregate counts for the caller's summary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub groups: usize,
    pub groups_unmatched: usize,
    pub files_matched: usize,
    pub files_changed: usize,
    pub files_unchanged: usize,
    pub files_failed: usize,
    pub lines_rewritten: usize,
    pub lines_skipped: usize,
}

impl ModifyReport {
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            groups: self.groups.len(),
            ..RunSummary::default()
        };

        for group in &self.groups {
            match &group.files {
                Err(_) => summary.files_failed += 1,
                Ok(files) => {
                    if files.is_empty() {
                        summary.groups_unmatched += 1;
                    }
                    summary.files_matched += files.len();
                    for report in files {
                        match &report.result {
                            Err(_) => summary.files_failed += 1,
                            Ok(patch) => {
                                if patch.changed {
                                    summary.files_changed += 1;
                                } else {
                                    summary.files_unchanged += 1;
                                }
                                for line in &patch.lines {
                                    if line.rewritten() {
                                        summary.lines_rewritten += 1;
                                    } else {
                                        summary.lines_skipped += 1;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        summary
    }

    pub fn has_failures(&self) -> bool {
        self.groups.iter().any(|group| match &group.files {
            Err(_) => true,
            Ok(files) => files.iter().any(|f| f.result.is_err()),
        })
    }
}

/// Restore-run report: discovered backups, the gate decision, and per-file
/// outcomes.
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub backups: Vec<String>,
    pub confirmed: bool,
    pub results: Vec<(String, Result<RestoreOutcome, BackupError>)>,
}

impl RestoreReport {
    pub fn restored(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, r)| matches!(r, Ok(RestoreOutcome::Restored)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_err()).count()
    }
}

/// The orchestrator: holds the resolved save directory and the active backup
/// policy, both passed in explicitly at construction.
#[derive(Debug, Clone)]
pub struct Patcher {
    save_dir: PathBuf,
    policy: BackupPolicy,
}

impl Patcher {
    pub fn new(save_dir: impl Into<PathBuf>, policy: BackupPolicy) -> Self {
        Self {
            save_dir: save_dir.into(),
            policy,
        }
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Modify run: locate, snapshot, rewrite, and persist, per directive
    /// group in directive order.
    pub fn apply(&self, directives: &DirectiveSet) -> ModifyReport {
        self.run(directives, true)
    }

    /// Read-only walk of the same work: reports what `apply` would do
    /// without creating backups or writing files.
    pub fn check(&self, directives: &DirectiveSet) -> ModifyReport {
        self.run(directives, false)
    }

    fn run(&self, directives: &DirectiveSet, persist: bool) -> ModifyReport {
        let groups = directives
            .groups
            .iter()
            .map(|group| GroupReport {
                base_name: group.base_name.clone(),
                files: self.run_group(group, persist),
            })
            .collect();

        ModifyReport { groups }
    }

    fn run_group(
        &self,
        group: &DirectiveGroup,
        persist: bool,
    ) -> Result<Vec<FileReport>, PatchError> {
        let files = locate(&group.base_name, &self.save_dir).map_err(|source| PatchError::Scan {
            path: self.save_dir.clone(),
            source,
        })?;

        Ok(files
            .into_iter()
            .map(|file| {
                let result = self.patch_file(&file, &group.edits, persist);
                FileReport { file, result }
            })
            .collect())
    }

    fn patch_file(
        &self,
        file: &str,
        edits: &[LineEdit],
        persist: bool,
    ) -> Result<FilePatch, PatchError> {
        let path = self.save_dir.join(file);
        let old_content = fs::read_to_string(&path).map_err(|source| PatchError::Read {
            path: path.clone(),
            source,
        })?;

        // Snapshot before the first byte of the live file can change.
        let backup = if persist {
            Some(BackupStore::new(&self.save_dir, self.policy).snapshot(file)?)
        } else {
            None
        };

        let mut content = old_content.clone();
        let mut lines = Vec::with_capacity(edits.len());
        for edit in edits {
            let replacement = edit.value.to_string();
            let outcome = match rewrite::apply(&content, edit.line, &replacement) {
                RewriteOutcome::Applied {
                    content: rewritten,
                    old_token,
                    new_token,
                } => {
                    content = rewritten;
                    LineOutcome::Rewritten {
                        old: old_token,
                        new: new_token,
                    }
                }
                RewriteOutcome::NoNumericToken => LineOutcome::NoNumericToken,
                RewriteOutcome::OutOfRange { line_count } => LineOutcome::OutOfRange { line_count },
            };
            lines.push(LineReport {
                line: edit.line,
                outcome,
            });
        }

        let changed = content != old_content;
        if persist && changed {
            atomic_write(&path, content.as_bytes()).map_err(|source| PatchError::Write {
                path: path.clone(),
                source,
            })?;
        }

        Ok(FilePatch {
            file: file.to_string(),
            backup,
            lines,
            old_content,
            new_content: content,
            changed,
        })
    }

    /// Restore run: enumerate `.backup` snapshots, gate on the operator's
    /// literal confirmation, then restore each one. A declined gate performs
    /// zero mutations and is not an error.
    pub fn restore_all(
        &self,
        prompt: &mut dyn OperatorPrompt,
    ) -> Result<RestoreReport, PatchError> {
        let backups = discover_backups(&self.save_dir).map_err(|source| PatchError::Scan {
            path: self.save_dir.clone(),
            source,
        })?;

        if backups.is_empty() {
            return Ok(RestoreReport::default());
        }

        let answer = prompt.confirm_restore(&backups);
        if !answer.trim().eq_ignore_ascii_case("yes") {
            return Ok(RestoreReport {
                backups,
                confirmed: false,
                results: Vec::new(),
            });
        }

        let engine = RestoreEngine::new(&self.save_dir);
        let results = backups
            .iter()
            .map(|name| (name.clone(), engine.restore(name)))
            .collect();

        Ok(RestoreReport {
            backups,
            confirmed: true,
            results,
        })
    }
}

/// Atomic file write: tempfile in the same directory + fsync + rename.
fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "path has no parent directory")
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::load_from_str;
    use tempfile::TempDir;

    /// Prompt with canned answers for the restore gate.
    struct ScriptedPrompt {
        answer: &'static str,
        asked: usize,
    }

    impl ScriptedPrompt {
        fn new(answer: &'static str) -> Self {
            Self { answer, asked: 0 }
        }
    }

    impl OperatorPrompt for ScriptedPrompt {
        fn select_directive_source(&mut self) -> SourceFallback {
            SourceFallback::Cancelled
        }

        fn confirm_restore(&mut self, _backups: &[String]) -> String {
            self.asked += 1;
            self.answer.to_string()
        }
    }

    fn directives(input: &str) -> DirectiveSet {
        load_from_str(input).unwrap()
    }

    #[test]
    fn test_apply_rewrites_and_backs_up() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ch1_0"), "HP: 30\nMP: 10\n").unwrap();

        let patcher = Patcher::new(dir.path(), BackupPolicy::UniqueVersioned);
        let report = patcher.apply(&directives(r#"{"ch1": {"1": 99}}"#));

        let summary = report.summary();
        assert_eq!(summary.files_matched, 1);
        assert_eq!(summary.files_changed, 1);
        assert_eq!(summary.lines_rewritten, 1);
        assert!(!report.has_failures());

        assert_eq!(
            fs::read_to_string(dir.path().join("ch1_0")).unwrap(),
            "HP: 99\nMP: 10\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("ch1_0.backup")).unwrap(),
            "HP: 30\nMP: 10\n"
        );
    }

    #[test]
    fn test_edits_applied_in_directive_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ch1_0"), "a: 1\nb: 2\nc: 3\n").unwrap();

        let patcher = Patcher::new(dir.path(), BackupPolicy::SingleSlot);
        // Document order (3 before 1) is the application and report order,
        // not numeric order.
        let report = patcher.apply(&directives(r#"{"ch1": {"3": 30, "1": 10}}"#));

        let files = report.groups[0].files.as_ref().unwrap();
        let patch = files[0].result.as_ref().unwrap();
        let reported: Vec<usize> = patch.lines.iter().map(|l| l.line).collect();
        assert_eq!(reported, vec![3, 1]);
        assert_eq!(
            fs::read_to_string(dir.path().join("ch1_0")).unwrap(),
            "a: 10\nb: 2\nc: 30\n"
        );
    }

    #[test]
    fn test_out_of_range_line_is_soft_and_others_apply() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ch1_0"), "HP: 30\nMP: 10\n").unwrap();

        let patcher = Patcher::new(dir.path(), BackupPolicy::UniqueVersioned);
        let report = patcher.apply(&directives(r#"{"ch1": {"99": 1, "2": 77}}"#));

        let summary = report.summary();
        assert_eq!(summary.lines_rewritten, 1);
        assert_eq!(summary.lines_skipped, 1);
        assert!(!report.has_failures());

        assert_eq!(
            fs::read_to_string(dir.path().join("ch1_0")).unwrap(),
            "HP: 30\nMP: 77\n"
        );
    }

    #[test]
    fn test_unmatched_group_is_not_a_failure() {
        let dir = TempDir::new().unwrap();

        let patcher = Patcher::new(dir.path(), BackupPolicy::UniqueVersioned);
        let report = patcher.apply(&directives(r#"{"ghost": {"1": 1}}"#));

        let summary = report.summary();
        assert_eq!(summary.groups_unmatched, 1);
        assert_eq!(summary.files_matched, 0);
        assert!(!report.has_failures());
    }

    #[test]
    fn test_batch_resilience_one_bad_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ch1_1"), "HP: 30\n").unwrap();
        // Not valid UTF-8: reading this save fails, the others still process.
        fs::write(dir.path().join("ch1_2"), [0xff, 0xfe, 0x30]).unwrap();
        fs::write(dir.path().join("ch1_3"), "HP: 30\n").unwrap();

        let patcher = Patcher::new(dir.path(), BackupPolicy::UniqueVersioned);
        let report = patcher.apply(&directives(r#"{"ch1": {"1": 99}}"#));

        let summary = report.summary();
        assert_eq!(summary.files_matched, 3);
        assert_eq!(summary.files_changed, 2);
        assert_eq!(summary.files_failed, 1);

        assert_eq!(
            fs::read_to_string(dir.path().join("ch1_1")).unwrap(),
            "HP: 99\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("ch1_3")).unwrap(),
            "HP: 99\n"
        );
    }

    #[test]
    fn test_check_mode_touches_nothing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ch1_0"), "HP: 30\n").unwrap();

        let patcher = Patcher::new(dir.path(), BackupPolicy::UniqueVersioned);
        let report = patcher.check(&directives(r#"{"ch1": {"1": 99}}"#));

        assert_eq!(report.summary().files_changed, 1);
        assert_eq!(
            fs::read_to_string(dir.path().join("ch1_0")).unwrap(),
            "HP: 30\n"
        );
        assert!(!dir.path().join("ch1_0.backup").exists());
    }

    #[test]
    fn test_missing_save_dir_is_group_level_soft_failure() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("saves");

        let patcher = Patcher::new(&missing, BackupPolicy::UniqueVersioned);
        let report = patcher.apply(&directives(r#"{"ch1": {"1": 1}, "ch2": {"1": 1}}"#));

        assert_eq!(report.groups.len(), 2);
        assert!(report.groups.iter().all(|g| g.files.is_err()));
        assert!(report.has_failures());
    }

    #[test]
    fn test_restore_declined_performs_no_mutation() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ch1_0"), "modified\n").unwrap();
        fs::write(dir.path().join("ch1_0.backup"), "original\n").unwrap();

        let patcher = Patcher::new(dir.path(), BackupPolicy::SingleSlot);
        let mut prompt = ScriptedPrompt::new("no");
        let report = patcher.restore_all(&mut prompt).unwrap();

        assert_eq!(prompt.asked, 1);
        assert!(!report.confirmed);
        assert_eq!(report.restored(), 0);
        assert_eq!(
            fs::read_to_string(dir.path().join("ch1_0")).unwrap(),
            "modified\n"
        );
    }

    #[test]
    fn test_restore_confirmation_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ch1_0"), "modified\n").unwrap();
        fs::write(dir.path().join("ch1_0.backup"), "original\n").unwrap();

        let patcher = Patcher::new(dir.path(), BackupPolicy::SingleSlot);
        let mut prompt = ScriptedPrompt::new("YES");
        let report = patcher.restore_all(&mut prompt).unwrap();

        assert!(report.confirmed);
        assert_eq!(report.restored(), 1);
        assert_eq!(report.failed(), 0);
        assert_eq!(
            fs::read_to_string(dir.path().join("ch1_0")).unwrap(),
            "original\n"
        );
    }

    #[test]
    fn test_restore_with_no_backups_never_prompts() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ch1_0"), "content\n").unwrap();

        let patcher = Patcher::new(dir.path(), BackupPolicy::SingleSlot);
        let mut prompt = ScriptedPrompt::new("yes");
        let report = patcher.restore_all(&mut prompt).unwrap();

        assert_eq!(prompt.asked, 0);
        assert!(report.backups.is_empty());
        assert_eq!(report.restored(), 0);
    }
}
