//! The storage collaborator boundary.
//!
//! Durable state lives behind [`GridStore`]; everything above it holds only
//! derived, invalidatable copies. Writes travel as [`WriteOp`] batches through
//! `run_atomic`, the multi-statement transaction primitive: every op in a
//! batch applies or none do. Id allocation is a sequence and is deliberately
//! not transactional; an id handed out for a write that later aborts is simply
//! never used again.

pub mod memory;

use crate::catalog::schema::ColumnDef;
use crate::catalog::types::Row;
use crate::catalog::view::ViewMeta;
use crate::error::{GridError, ResourceType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One write inside an atomic batch. Puts are upserts; deletes of absent
/// records are no-ops so interrupted cascades can be retried verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum WriteOp {
    PutView(ViewMeta),
    DeleteView { view_id: i64 },
    PutColumn(ColumnDef),
    DeleteColumn { column_id: i64 },
    PutRow(Row),
    DeleteRow { row_id: i64 },
}

#[async_trait]
pub trait GridStore: Send + Sync {
    async fn get_view(&self, view_id: i64) -> Result<Option<ViewMeta>, GridError>;

    /// Views of one owner, ordered by creation index then id.
    async fn list_views(&self, owner_id: &str) -> Result<Vec<ViewMeta>, GridError>;

    async fn count_views(&self, owner_id: &str) -> Result<u64, GridError>;

    /// Column definitions of a view, ordered by creation (id ascending).
    async fn list_columns(&self, view_id: i64) -> Result<Vec<ColumnDef>, GridError>;

    async fn get_row(&self, row_id: i64) -> Result<Option<Row>, GridError>;

    /// Rows of a view, ordered by creation time then id.
    async fn list_rows(&self, view_id: i64) -> Result<Vec<Row>, GridError>;

    /// Next id from the per-resource sequence. Never rolled back.
    async fn allocate_id(&self, kind: ResourceType) -> Result<i64, GridError>;

    /// Apply every op or none. Referential breakage inside the batch aborts it
    /// with `TransactionFailure`.
    async fn run_atomic(&self, ops: Vec<WriteOp>) -> Result<(), GridError>;
}
