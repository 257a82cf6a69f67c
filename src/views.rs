//! View lifecycle: creation with the starter schema, rename, cascading delete.

use crate::caller::CallerContext;
use crate::catalog::schema::ColumnDef;
use crate::catalog::types::{FieldMap, FieldType, FieldValue, Row};
use crate::catalog::view::ViewMeta;
use crate::codec;
use crate::error::{GridError, ResourceType};
use crate::store::{GridStore, WriteOp};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

pub const STARTER_NOTES_COLUMN: &str = "Notes";
pub const STARTER_STATUS_COLUMN: &str = "Status";
pub const STARTER_STATUS_DEFAULT: &str = "Active";
pub const STARTER_DATE_COLUMN: &str = "CreatedOn";

/// Fetch a view and check it belongs to the caller. Shared by every service
/// that scopes an operation to a view.
pub(crate) async fn resolve_owned_view(
    store: &dyn GridStore,
    caller: &CallerContext,
    view_id: i64,
) -> Result<ViewMeta, GridError> {
    let view = store
        .get_view(view_id)
        .await?
        .ok_or_else(|| GridError::NotFound {
            resource_type: ResourceType::View,
            resource_id: view_id.to_string(),
        })?;
    if !caller.owns(&view.owner_id) {
        return Err(GridError::PermissionDenied(format!(
            "view {view_id} belongs to another owner"
        )));
    }
    Ok(view)
}

#[derive(Clone)]
pub struct ViewLifecycle {
    store: Arc<dyn GridStore>,
}

impl ViewLifecycle {
    pub fn new(store: Arc<dyn GridStore>) -> Self {
        Self { store }
    }

    /// Create a view together with its starter columns and one seed row, in a
    /// single atomic batch. The starter set is a free-text column, a status
    /// column defaulted to "Active" and a date column defaulted to the
    /// creation instant; the seed row carries both defaults in its field map.
    pub async fn create(&self, caller: &CallerContext, name: &str) -> Result<ViewMeta, GridError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(GridError::EmptyName);
        }

        let order = self.store.count_views(&caller.caller_id).await? as u32;
        let now = Utc::now();
        let view_id = self.store.allocate_id(ResourceType::View).await?;
        let view = ViewMeta {
            id: view_id,
            name: trimmed.to_string(),
            owner_id: caller.caller_id.clone(),
            order,
            created_at: now,
        };

        let starter_defs = [
            (STARTER_NOTES_COLUMN, FieldType::String, None),
            (
                STARTER_STATUS_COLUMN,
                FieldType::String,
                Some(FieldValue::Text(STARTER_STATUS_DEFAULT.into())),
            ),
            (STARTER_DATE_COLUMN, FieldType::Date, Some(FieldValue::Date(now))),
        ];

        let mut ops = vec![WriteOp::PutView(view.clone())];
        let mut seed_fields = FieldMap::default();
        for (column_name, field_type, default) in starter_defs {
            let column_id = self.store.allocate_id(ResourceType::Column).await?;
            if let Some(default) = &default {
                seed_fields.insert(column_name.to_string(), default.clone());
            }
            ops.push(WriteOp::PutColumn(ColumnDef {
                id: column_id,
                view_id,
                owner_id: caller.caller_id.clone(),
                name: column_name.to_string(),
                field_type,
                is_required: false,
                default_value: default.as_ref().map(codec::display_value),
            }));
        }

        let row_id = self.store.allocate_id(ResourceType::Row).await?;
        ops.push(WriteOp::PutRow(Row {
            id: row_id,
            view_id,
            owner_id: caller.caller_id.clone(),
            name: String::new(),
            created_at: now,
            updated_at: now,
            fields: seed_fields,
        }));

        self.store.run_atomic(ops).await?;
        info!(view_id, owner_id = %caller.caller_id, name = %view.name, "created view");
        Ok(view)
    }

    pub async fn get(&self, caller: &CallerContext, view_id: i64) -> Result<ViewMeta, GridError> {
        resolve_owned_view(self.store.as_ref(), caller, view_id).await
    }

    pub async fn list(&self, caller: &CallerContext) -> Result<Vec<ViewMeta>, GridError> {
        self.store.list_views(&caller.caller_id).await
    }

    pub async fn rename(
        &self,
        caller: &CallerContext,
        view_id: i64,
        name: &str,
    ) -> Result<ViewMeta, GridError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(GridError::EmptyName);
        }
        let mut view = resolve_owned_view(self.store.as_ref(), caller, view_id).await?;
        view.name = trimmed.to_string();
        self.store
            .run_atomic(vec![WriteOp::PutView(view.clone())])
            .await?;
        Ok(view)
    }

    /// Cascade in three sequenced atomic steps: rows, column definitions, the
    /// view itself. A failure between steps leaves the view present with some
    /// children already gone; rerunning the delete converges because delete
    /// ops are no-ops on absent records.
    pub async fn delete(&self, caller: &CallerContext, view_id: i64) -> Result<(), GridError> {
        resolve_owned_view(self.store.as_ref(), caller, view_id).await?;

        let rows = self.store.list_rows(view_id).await?;
        let row_count = rows.len();
        if !rows.is_empty() {
            let ops = rows
                .into_iter()
                .map(|r| WriteOp::DeleteRow { row_id: r.id })
                .collect();
            self.store.run_atomic(ops).await?;
        }

        let columns = self.store.list_columns(view_id).await?;
        let column_count = columns.len();
        if !columns.is_empty() {
            let ops = columns
                .into_iter()
                .map(|c| WriteOp::DeleteColumn { column_id: c.id })
                .collect();
            self.store.run_atomic(ops).await?;
        }

        self.store
            .run_atomic(vec![WriteOp::DeleteView { view_id }])
            .await?;
        info!(
            view_id,
            rows = row_count,
            columns = column_count,
            "deleted view and its children"
        );
        Ok(())
    }
}
