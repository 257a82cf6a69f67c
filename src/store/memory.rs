use crate::catalog::schema::ColumnDef;
use crate::catalog::types::Row;
use crate::catalog::view::ViewMeta;
use crate::error::{GridError, ResourceType};
use crate::store::{GridStore, WriteOp};
use async_trait::async_trait;
use im::OrdMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug, Clone, Default)]
struct MemState {
    views: OrdMap<i64, ViewMeta>,
    columns: OrdMap<i64, ColumnDef>,
    rows: OrdMap<i64, Row>,
}

/// In-process reference store.
///
/// State is persistent maps behind one mutex; `run_atomic` applies a batch to
/// a trial clone and swaps it in only when every op succeeded, so a failed
/// batch leaves no trace. Id sequences start at 1, leaving the negative range
/// free for the cache layer's synthetic identities.
pub struct MemStore {
    state: Mutex<MemState>,
    next_view_id: AtomicI64,
    next_column_id: AtomicI64,
    next_row_id: AtomicI64,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemState::default()),
            next_view_id: AtomicI64::new(1),
            next_column_id: AtomicI64::new(1),
            next_row_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_op(state: &mut MemState, op: WriteOp) -> Result<(), GridError> {
    match op {
        WriteOp::PutView(view) => {
            state.views.insert(view.id, view);
        }
        WriteOp::DeleteView { view_id } => {
            state.views.remove(&view_id);
        }
        WriteOp::PutColumn(def) => {
            if !state.views.contains_key(&def.view_id) {
                return Err(GridError::TransactionFailure(format!(
                    "column '{}' references missing view {}",
                    def.name, def.view_id
                )));
            }
            state.columns.insert(def.id, def);
        }
        WriteOp::DeleteColumn { column_id } => {
            state.columns.remove(&column_id);
        }
        WriteOp::PutRow(row) => {
            if !state.views.contains_key(&row.view_id) {
                return Err(GridError::TransactionFailure(format!(
                    "row {} references missing view {}",
                    row.id, row.view_id
                )));
            }
            state.rows.insert(row.id, row);
        }
        WriteOp::DeleteRow { row_id } => {
            state.rows.remove(&row_id);
        }
    }
    Ok(())
}

#[async_trait]
impl GridStore for MemStore {
    async fn get_view(&self, view_id: i64) -> Result<Option<ViewMeta>, GridError> {
        Ok(self.state.lock().views.get(&view_id).cloned())
    }

    async fn list_views(&self, owner_id: &str) -> Result<Vec<ViewMeta>, GridError> {
        let state = self.state.lock();
        let mut views: Vec<ViewMeta> = state
            .views
            .values()
            .filter(|v| v.owner_id == owner_id)
            .cloned()
            .collect();
        views.sort_by_key(|v| (v.order, v.id));
        Ok(views)
    }

    async fn count_views(&self, owner_id: &str) -> Result<u64, GridError> {
        let state = self.state.lock();
        Ok(state.views.values().filter(|v| v.owner_id == owner_id).count() as u64)
    }

    async fn list_columns(&self, view_id: i64) -> Result<Vec<ColumnDef>, GridError> {
        let state = self.state.lock();
        Ok(state
            .columns
            .values()
            .filter(|c| c.view_id == view_id)
            .cloned()
            .collect())
    }

    async fn get_row(&self, row_id: i64) -> Result<Option<Row>, GridError> {
        Ok(self.state.lock().rows.get(&row_id).cloned())
    }

    async fn list_rows(&self, view_id: i64) -> Result<Vec<Row>, GridError> {
        let state = self.state.lock();
        let mut rows: Vec<Row> = state
            .rows
            .values()
            .filter(|r| r.view_id == view_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.created_at, r.id));
        Ok(rows)
    }

    async fn allocate_id(&self, kind: ResourceType) -> Result<i64, GridError> {
        let sequence = match kind {
            ResourceType::View => &self.next_view_id,
            ResourceType::Column => &self.next_column_id,
            ResourceType::Row => &self.next_row_id,
        };
        Ok(sequence.fetch_add(1, Ordering::SeqCst))
    }

    async fn run_atomic(&self, ops: Vec<WriteOp>) -> Result<(), GridError> {
        let mut state = self.state.lock();
        let mut trial = state.clone();
        for op in ops {
            apply_op(&mut trial, op)?;
        }
        *state = trial;
        Ok(())
    }
}
