//! Typed directive model and validation.
//!
//! The directive document is a JSON object whose entries are either the
//! reserved `settings` entry or a chapter entry: a base name mapping to an
//! object of string-encoded 1-based line numbers and numeric replacement
//! values. The raw document is dynamically shaped; this module turns it into
//! a validated, ordered model before the patcher ever sees it.

use crate::backup::BackupPolicy;
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use std::fmt;
use std::path::{Path, PathBuf};

/// Reserved top-level key carrying run settings rather than a chapter.
pub const SETTINGS_KEY: &str = "settings";

/// Run settings extracted from the reserved `settings` entry.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Settings {
    /// Save directory; relative paths are resolved against the base
    /// directory by the caller.
    #[serde(default)]
    pub save_path: Option<String>,
    /// Snapshot naming policy for modify runs.
    #[serde(default)]
    pub backup_policy: Option<BackupPolicyChoice>,
}

/// Document-level spelling of the backup policy.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BackupPolicyChoice {
    Versioned,
    SingleSlot,
}

impl BackupPolicyChoice {
    pub fn to_policy(self) -> BackupPolicy {
        match self {
            BackupPolicyChoice::Versioned => BackupPolicy::UniqueVersioned,
            BackupPolicyChoice::SingleSlot => BackupPolicy::SingleSlot,
        }
    }
}

/// A replacement value exactly as written in the directive document.
///
/// Backed by a JSON number so integers render without a trailing decimal
/// point and decimals keep their given precision (`2.50` stays `2.50`).
#[derive(Debug, Clone, PartialEq)]
pub struct TargetValue(Number);

impl TargetValue {
    pub fn number(&self) -> &Number {
        &self.0
    }
}

impl From<Number> for TargetValue {
    fn from(number: Number) -> Self {
        TargetValue(number)
    }
}

impl fmt::Display for TargetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One line edit: 1-based line index and the value it should hold.
#[derive(Debug, Clone, PartialEq)]
pub struct LineEdit {
    pub line: usize,
    pub value: TargetValue,
}

/// A named set of line edits applied to all save files sharing a base name.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveGroup {
    pub base_name: String,
    pub edits: Vec<LineEdit>,
}

/// The validated directive set: settings plus groups in document order.
#[derive(Debug, Clone, Default)]
pub struct DirectiveSet {
    pub settings: Settings,
    pub groups: Vec<DirectiveGroup>,
}

impl DirectiveSet {
    /// Build a validated set from a raw JSON document, accumulating every
    /// problem found rather than stopping at the first.
    pub fn from_document(document: Map<String, Value>) -> Result<Self, ValidationError> {
        let mut settings = Settings::default();
        let mut groups = Vec::new();
        let mut issues = Vec::new();

        for (key, value) in document {
            if key == SETTINGS_KEY {
                match serde_json::from_value::<Settings>(value) {
                    Ok(parsed) => settings = parsed,
                    Err(e) => issues.push(ValidationIssue::InvalidSettings {
                        message: e.to_string(),
                    }),
                }
                continue;
            }

            let Value::Object(entries) = value else {
                issues.push(ValidationIssue::GroupNotObject { group: key });
                continue;
            };

            let mut edits = Vec::new();
            for (line_key, target) in entries {
                let line = match line_key.parse::<usize>() {
                    Ok(line) if line >= 1 => line,
                    _ => {
                        issues.push(ValidationIssue::InvalidLineIndex {
                            group: key.clone(),
                            key: line_key,
                        });
                        continue;
                    }
                };

                match target {
                    Value::Number(number) => edits.push(LineEdit {
                        line,
                        value: TargetValue(number),
                    }),
                    _ => issues.push(ValidationIssue::NonNumericValue {
                        group: key.clone(),
                        key: line_key,
                    }),
                }
            }

            groups.push(DirectiveGroup {
                base_name: key,
                edits,
            });
        }

        if issues.is_empty() {
            Ok(DirectiveSet { settings, groups })
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Resolve the save directory against an explicit base directory.
    pub fn resolve_save_dir(&self, base_dir: &Path) -> PathBuf {
        match self.settings.save_path.as_deref() {
            Some(path) if Path::new(path).is_absolute() => PathBuf::from(path),
            Some(path) => base_dir.join(path),
            None => base_dir.to_path_buf(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    InvalidSettings { message: String },
    GroupNotObject { group: String },
    InvalidLineIndex { group: String, key: String },
    NonNumericValue { group: String, key: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::InvalidSettings { message } => {
                write!(f, "invalid settings entry: {message}")
            }
            ValidationIssue::GroupNotObject { group } => {
                write!(f, "chapter '{group}' is not an object of line edits")
            }
            ValidationIssue::InvalidLineIndex { group, key } => {
                write!(
                    f,
                    "chapter '{group}' has non-positive or non-integer line key '{key}'"
                )
            }
            ValidationIssue::NonNumericValue { group, key } => {
                write!(f, "chapter '{group}' line '{key}' has a non-numeric value")
            }
        }
    }
}
