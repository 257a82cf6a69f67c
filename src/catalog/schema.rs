use crate::catalog::types::FieldType;
use crate::error::GridError;
use serde::{Deserialize, Serialize};

/// A user-defined column declared for one view.
///
/// Names are unique within the owning view. Renames are not supported; a
/// column is removed and re-added instead, which keeps the backfill and strip
/// cascades the only schema migrations in the system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnDef {
    pub id: i64,
    pub view_id: i64,
    pub owner_id: String,
    pub name: String,
    pub field_type: FieldType,
    pub is_required: bool,
    /// Default recorded in its display form; dates as ISO-8601 instants.
    #[serde(default)]
    pub default_value: Option<String>,
}

/// Column names are identifier-shaped: leading letter or underscore, then
/// letters, digits and underscores.
pub fn validate_column_name(name: &str, max_len: usize) -> Result<(), GridError> {
    if name.is_empty() {
        return Err(GridError::Validation(
            "column name must not be empty".into(),
        ));
    }
    if name.len() > max_len {
        return Err(GridError::Validation(format!(
            "column name must be <= {max_len} bytes"
        )));
    }
    let mut chars = name.chars();
    let first = chars.next().expect("name checked non-empty");
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(GridError::Validation(
            "column name must start with a letter or underscore".into(),
        ));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(GridError::Validation(
            "column name must contain only [A-Za-z0-9_]".into(),
        ));
    }
    Ok(())
}
