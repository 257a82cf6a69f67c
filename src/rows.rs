//! Row operations: creation, listing, and the allowlist-then-merge cell
//! update.

use crate::caller::CallerContext;
use crate::catalog::FixedField;
use crate::catalog::types::{FieldMap, FieldValue, Row};
use crate::error::{GridError, ResourceType};
use crate::store::{GridStore, WriteOp};
use crate::views::resolve_owned_view;
use chrono::Utc;
use std::sync::Arc;

#[derive(Clone)]
pub struct RowStore {
    store: Arc<dyn GridStore>,
}

impl RowStore {
    pub fn new(store: Arc<dyn GridStore>) -> Self {
        Self { store }
    }

    /// Store the row exactly as given. Required columns are not enforced here
    /// and defaults are not applied; callers that want defaults pre-populate
    /// them from the column registry before calling.
    pub async fn create_row(
        &self,
        caller: &CallerContext,
        view_id: i64,
        display_name: &str,
        fields: FieldMap,
    ) -> Result<Row, GridError> {
        resolve_owned_view(self.store.as_ref(), caller, view_id).await?;

        let id = self.store.allocate_id(ResourceType::Row).await?;
        let now = Utc::now();
        let row = Row {
            id,
            view_id,
            owner_id: caller.caller_id.clone(),
            name: display_name.to_string(),
            created_at: now,
            updated_at: now,
            fields,
        };
        self.store
            .run_atomic(vec![WriteOp::PutRow(row.clone())])
            .await?;
        Ok(row)
    }

    pub async fn list_rows(
        &self,
        caller: &CallerContext,
        view_id: i64,
    ) -> Result<Vec<Row>, GridError> {
        resolve_owned_view(self.store.as_ref(), caller, view_id).await?;
        let rows = self.store.list_rows(view_id).await?;
        Ok(rows
            .into_iter()
            .filter(|r| caller.owns(&r.owner_id))
            .collect())
    }

    pub async fn latest_row(
        &self,
        caller: &CallerContext,
        view_id: i64,
    ) -> Result<Option<Row>, GridError> {
        Ok(self.list_rows(caller, view_id).await?.pop())
    }

    /// Overwrite a fixed field or merge one custom field into the row's map.
    ///
    /// The read-modify-write preserves sibling custom fields but is not
    /// atomic against concurrent updates of the same row; the later write
    /// wins. A row that is absent, in another view, or owned by someone else
    /// reports plain `RowNotFound`.
    pub async fn update_cell(
        &self,
        caller: &CallerContext,
        view_id: i64,
        row_id: i64,
        column_id: &str,
        value: FieldValue,
    ) -> Result<Row, GridError> {
        resolve_owned_view(self.store.as_ref(), caller, view_id).await?;

        let row = self
            .store
            .get_row(row_id)
            .await?
            .filter(|r| r.view_id == view_id && caller.owns(&r.owner_id))
            .ok_or_else(|| GridError::NotFound {
                resource_type: ResourceType::Row,
                resource_id: row_id.to_string(),
            })?;

        let mut updated = row;
        match FixedField::resolve(column_id) {
            Some(FixedField::Id) => {
                updated.id = expect_row_id(&value)?;
            }
            Some(FixedField::Name) => match value {
                FieldValue::Text(s) => updated.name = s.to_string(),
                other => {
                    return Err(GridError::Validation(format!(
                        "fixed field 'name' expects a string, got {}",
                        other.field_type()
                    )));
                }
            },
            Some(FixedField::CreatedAt) => match value {
                FieldValue::Date(d) => updated.created_at = d,
                other => {
                    return Err(GridError::Validation(format!(
                        "fixed field 'createdAt' expects a date, got {}",
                        other.field_type()
                    )));
                }
            },
            None => {
                updated.fields.insert(column_id.to_string(), value);
            }
        }
        updated.updated_at = Utc::now();

        // Moving a row to a new id is a delete-then-put, still one batch.
        let ops = if updated.id != row_id {
            vec![WriteOp::DeleteRow { row_id }, WriteOp::PutRow(updated.clone())]
        } else {
            vec![WriteOp::PutRow(updated.clone())]
        };
        self.store.run_atomic(ops).await?;
        Ok(updated)
    }
}

fn expect_row_id(value: &FieldValue) -> Result<i64, GridError> {
    match value {
        FieldValue::Number(n) if n.fract() == 0.0 && n.abs() <= i64::MAX as f64 => Ok(*n as i64),
        FieldValue::Number(_) => Err(GridError::Validation(
            "fixed field 'id' expects an integer".into(),
        )),
        other => Err(GridError::Validation(format!(
            "fixed field 'id' expects a number, got {}",
            other.field_type()
        ))),
    }
}
