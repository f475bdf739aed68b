pub mod loader;
pub mod schema;

pub use loader::{load_from_path, load_from_str, DirectiveError};
pub use schema::{
    BackupPolicyChoice, DirectiveGroup, DirectiveSet, LineEdit, Settings, TargetValue,
    ValidationError, ValidationIssue, SETTINGS_KEY,
};
