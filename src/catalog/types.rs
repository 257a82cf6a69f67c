use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

/// Declared type of a user-defined column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::String => write!(f, "string"),
            FieldType::Number => write!(f, "number"),
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Date => write!(f, "date"),
        }
    }
}

/// One cell value inside a row's field map.
///
/// Untagged so a field map serializes as a plain JSON object; the declared
/// column type, not a wire tag, is what gives a value its meaning on read.
/// Variant order matters for deserialization: an RFC 3339 string is a `Date`,
/// any other string is `Text`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    Number(f64),
    Date(DateTime<Utc>),
    Text(CompactString),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Boolean(_) => FieldType::Boolean,
            FieldValue::Number(_) => FieldType::Number,
            FieldValue::Date(_) => FieldType::Date,
            FieldValue::Text(_) => FieldType::String,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Date(value)
    }
}

/// Column name to typed value. Persistent map so snapshots and trial states
/// share structure instead of deep-copying.
pub type FieldMap = im::OrdMap<String, FieldValue>;

fn null_to_empty_fields<'de, D>(deserializer: D) -> Result<FieldMap, D::Error>
where
    D: Deserializer<'de>,
{
    let fields = Option::<FieldMap>::deserialize(deserializer)?;
    Ok(fields.unwrap_or_default())
}

/// One record of a view: fixed fields plus the open field map.
///
/// Keys in `fields` follow the view's column definitions but are not eagerly
/// pruned when a definition is removed; stale keys are stripped by the removal
/// cascade and tolerated until then.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Row {
    pub id: i64,
    pub view_id: i64,
    pub owner_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_to_empty_fields")]
    pub fields: FieldMap,
}
