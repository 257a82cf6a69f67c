use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named, user-owned view: one tab of the grid, owning a disjoint set of
/// column definitions and rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewMeta {
    pub id: i64,
    pub name: String,
    pub owner_id: String,
    /// Creation index among the owner's views; listings sort by it ascending.
    pub order: u32,
    pub created_at: DateTime<Utc>,
}
