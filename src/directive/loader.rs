use crate::directive::schema::{DirectiveSet, ValidationError};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum DirectiveError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Json {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl DirectiveError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            DirectiveError::Io { .. } => self,
            DirectiveError::Json { path: None, source } => DirectiveError::Json {
                path: Some(path),
                source,
            },
            DirectiveError::Validation { path: None, source } => DirectiveError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }

    /// True when the directive source itself is absent, the one condition
    /// callers may recover from by re-selecting a source or entering restore
    /// mode.
    pub fn is_source_missing(&self) -> bool {
        matches!(
            self,
            DirectiveError::Io { source, .. }
                if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

impl fmt::Display for DirectiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectiveError::Io { path, source } => {
                write!(
                    f,
                    "failed to read directive file {}: {}",
                    path.display(),
                    source
                )
            }
            DirectiveError::Json { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse directive JSON ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse directive JSON: {}", source),
            },
            DirectiveError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid directive set ({}): {}", path.display(), source),
                None => write!(f, "invalid directive set: {}", source),
            },
        }
    }
}

impl std::error::Error for DirectiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DirectiveError::Io { source, .. } => Some(source),
            DirectiveError::Json { source, .. } => Some(source),
            DirectiveError::Validation { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<DirectiveSet, DirectiveError> {
    let document: Map<String, Value> = serde_json::from_str(input)
        .map_err(|source| DirectiveError::Json { path: None, source })?;
    DirectiveSet::from_document(document)
        .map_err(|source| DirectiveError::Validation { path: None, source })
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<DirectiveSet, DirectiveError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| DirectiveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}
