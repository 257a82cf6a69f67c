pub mod schema;
pub mod types;
pub mod view;

use crate::catalog::types::FieldType;

/// Fixed row fields addressable through the cell-update path.
///
/// The allowlist is checked before a column id falls through to the dynamic
/// field map, so a user column can never shadow a fixed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedField {
    Id,
    Name,
    CreatedAt,
}

impl FixedField {
    pub fn resolve(column_id: &str) -> Option<FixedField> {
        match column_id {
            "id" => Some(FixedField::Id),
            "name" => Some(FixedField::Name),
            "createdAt" => Some(FixedField::CreatedAt),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FixedField::Id => "id",
            FixedField::Name => "name",
            FixedField::CreatedAt => "createdAt",
        }
    }

    /// Declared type used when a cell edit addresses the fixed field.
    pub fn field_type(self) -> FieldType {
        match self {
            FixedField::Id => FieldType::Number,
            FixedField::Name => FieldType::String,
            FixedField::CreatedAt => FieldType::Date,
        }
    }
}
