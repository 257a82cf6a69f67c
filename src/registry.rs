//! Column definitions per view: add with default backfill, remove with a
//! strip cascade, list in creation order.

use crate::caller::CallerContext;
use crate::catalog::schema::{ColumnDef, validate_column_name};
use crate::catalog::types::{FieldType, FieldValue};
use crate::codec;
use crate::config::GridConfig;
use crate::error::{GridError, ResourceType};
use crate::store::{GridStore, WriteOp};
use crate::views::resolve_owned_view;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct ColumnRegistry {
    store: Arc<dyn GridStore>,
    config: GridConfig,
}

impl ColumnRegistry {
    pub fn new(store: Arc<dyn GridStore>, config: GridConfig) -> Self {
        Self { store, config }
    }

    /// Declare a column on a view. A supplied default is recorded on the
    /// definition in display form and written typed into every existing row;
    /// the definition insert and the whole backfill are one atomic batch, so
    /// a partially back-filled view is never observable.
    pub async fn add_column(
        &self,
        caller: &CallerContext,
        view_id: i64,
        name: &str,
        field_type: FieldType,
        is_required: bool,
        default: Option<FieldValue>,
    ) -> Result<ColumnDef, GridError> {
        resolve_owned_view(self.store.as_ref(), caller, view_id).await?;
        validate_column_name(name, self.config.max_column_name_len)?;

        let existing = self.store.list_columns(view_id).await?;
        if existing.iter().any(|c| c.name == name) {
            return Err(GridError::AlreadyExists {
                resource_type: ResourceType::Column,
                resource_id: name.to_string(),
            });
        }
        if existing.len() >= self.config.max_columns_per_view {
            return Err(GridError::Validation(format!(
                "view {view_id} already has {} columns (limit {})",
                existing.len(),
                self.config.max_columns_per_view
            )));
        }

        let id = self.store.allocate_id(ResourceType::Column).await?;
        let def = ColumnDef {
            id,
            view_id,
            owner_id: caller.caller_id.clone(),
            name: name.to_string(),
            field_type,
            is_required,
            default_value: default.as_ref().map(codec::display_value),
        };

        let mut ops = vec![WriteOp::PutColumn(def.clone())];
        let mut backfilled = 0usize;
        if let Some(default) = default {
            let now = Utc::now();
            for mut row in self.store.list_rows(view_id).await? {
                row.fields.insert(name.to_string(), default.clone());
                row.updated_at = now;
                ops.push(WriteOp::PutRow(row));
                backfilled += 1;
            }
        }
        self.store.run_atomic(ops).await?;
        info!(view_id, column = name, backfilled, "added column");
        Ok(def)
    }

    /// Remove a column definition, then strip the key from every row of the
    /// view. The two steps are sequenced: when the strip batch fails the
    /// definition is already gone and rows keep dead keys, which is reported
    /// as `CascadeIncomplete` rather than rolled back.
    pub async fn remove_column(
        &self,
        caller: &CallerContext,
        view_id: i64,
        name: &str,
    ) -> Result<(), GridError> {
        resolve_owned_view(self.store.as_ref(), caller, view_id).await?;

        let columns = self.store.list_columns(view_id).await?;
        let def = columns
            .into_iter()
            .find(|c| c.name == name)
            .ok_or_else(|| GridError::NotFound {
                resource_type: ResourceType::Column,
                resource_id: name.to_string(),
            })?;

        self.store
            .run_atomic(vec![WriteOp::DeleteColumn { column_id: def.id }])
            .await?;

        let now = Utc::now();
        let mut ops = Vec::new();
        for mut row in self.store.list_rows(view_id).await? {
            if row.fields.remove(name).is_some() {
                row.updated_at = now;
                ops.push(WriteOp::PutRow(row));
            }
        }
        let stripped = ops.len();
        if !ops.is_empty() {
            if let Err(err) = self.store.run_atomic(ops).await {
                warn!(
                    view_id,
                    column = name,
                    error = %err,
                    "column removed but row strip cascade failed"
                );
                return Err(GridError::CascadeIncomplete {
                    view_id,
                    column: name.to_string(),
                    detail: err.to_string(),
                });
            }
        }
        info!(view_id, column = name, stripped, "removed column");
        Ok(())
    }

    /// Definitions of a view in creation order.
    pub async fn list(
        &self,
        caller: &CallerContext,
        view_id: i64,
    ) -> Result<Vec<ColumnDef>, GridError> {
        resolve_owned_view(self.store.as_ref(), caller, view_id).await?;
        self.store.list_columns(view_id).await
    }
}
