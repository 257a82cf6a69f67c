pub mod cache;
pub mod caller;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod registry;
pub mod rows;
pub mod store;
pub mod views;

use crate::cache::coordinator::run_mutation;
use crate::cache::{ViewCache, ViewData};
use crate::caller::CallerContext;
use crate::catalog::FixedField;
use crate::catalog::schema::ColumnDef;
use crate::catalog::types::{FieldMap, FieldType, FieldValue, Row};
use crate::catalog::view::ViewMeta;
use crate::config::GridConfig;
use crate::error::{GridError, ResourceType};
use crate::registry::ColumnRegistry;
use crate::rows::RowStore;
use crate::store::GridStore;
use crate::store::memory::MemStore;
use crate::views::ViewLifecycle;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{info, warn};

/// Declaration of a new column as supplied by the caller. The default arrives
/// in raw text form and is coerced through the codec before anything is
/// written; a default that does not parse under `field_type` fails the whole
/// operation up front.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub name: String,
    pub field_type: FieldType,
    pub is_required: bool,
    pub default: Option<String>,
}

/// Caller-supplied payload for a new row. Fields are stored as given; callers
/// that want column defaults pre-populate them.
#[derive(Debug, Clone, Default)]
pub struct RowSeed {
    pub name: String,
    pub fields: FieldMap,
}

/// Combined fetch of everything one view renders from.
async fn fetch_view(
    views: &ViewLifecycle,
    registry: &ColumnRegistry,
    rows: &RowStore,
    caller: &CallerContext,
    view_id: i64,
) -> Result<ViewData, GridError> {
    let view = views.get(caller, view_id).await?;
    let columns = registry.list(caller, view_id).await?;
    let rows = rows.list_rows(caller, view_id).await?;
    Ok(ViewData {
        view,
        columns: columns.into_iter().collect(),
        rows: rows.into_iter().collect(),
    })
}

/// Optimistic form of a cell edit, applied to the cached snapshot. An id edit
/// is left to the commit fixup; the authoritative row replaces the cached one
/// wholesale there.
fn apply_cell_edit(data: &mut ViewData, row_id: i64, column_id: &str, value: FieldValue) {
    let Some(row) = data.rows.iter_mut().find(|r| r.id == row_id) else {
        return;
    };
    match FixedField::resolve(column_id) {
        Some(FixedField::Id) => return,
        Some(FixedField::Name) => {
            if let Some(name) = value.as_text() {
                row.name = name.to_string();
            }
        }
        Some(FixedField::CreatedAt) => {
            if let Some(date) = value.as_date() {
                row.created_at = date;
            }
        }
        None => {
            row.fields.insert(column_id.to_string(), value);
        }
    }
    row.updated_at = Utc::now();
}

/// A client-facing grid instance: services over one [`GridStore`] plus the
/// optimistic view cache.
///
/// Reads are served read-through and a fresh cached snapshot short-circuits
/// the store entirely. Mutations run the four-phase protocol of
/// [`cache::coordinator`] against the slot of the projection they affect and
/// resolve by scheduling a refetch. Synthetic identities handed out before a
/// commit confirms are negative and can never collide with store ids.
pub struct GridBase {
    config: GridConfig,
    views: ViewLifecycle,
    registry: ColumnRegistry,
    rows: RowStore,
    cache: Arc<ViewCache>,
    temp_ids: AtomicI64,
}

impl GridBase {
    pub fn open(config: GridConfig, store: Arc<dyn GridStore>) -> Result<Self, GridError> {
        config.validate()?;
        info!(
            background_refetch = config.background_refetch,
            max_column_name_len = config.max_column_name_len,
            max_columns_per_view = config.max_columns_per_view,
            "gridbase config"
        );
        Ok(Self {
            views: ViewLifecycle::new(Arc::clone(&store)),
            registry: ColumnRegistry::new(Arc::clone(&store), config.clone()),
            rows: RowStore::new(store),
            cache: Arc::new(ViewCache::new()),
            temp_ids: AtomicI64::new(-1),
            config,
        })
    }

    pub fn open_in_memory(config: GridConfig) -> Result<Self, GridError> {
        Self::open(config, Arc::new(MemStore::new()))
    }

    fn next_temp_id(&self) -> i64 {
        self.temp_ids.fetch_sub(1, Ordering::Relaxed)
    }

    /// Everything one view renders from, served from the cache when fresh.
    /// The fetched snapshot is installed generation-checked, so a read racing
    /// a mutation returns its data without clobbering the optimistic state.
    pub async fn view_snapshot(
        &self,
        caller: &CallerContext,
        view_id: i64,
    ) -> Result<ViewData, GridError> {
        if let Some(data) = self.cache.views.fresh(&view_id) {
            return Ok(data);
        }
        let generation = self.cache.views.generation(view_id);
        let data = fetch_view(&self.views, &self.registry, &self.rows, caller, view_id).await?;
        self.cache.views.install(view_id, generation, data.clone());
        Ok(data)
    }

    pub async fn list_columns(
        &self,
        caller: &CallerContext,
        view_id: i64,
    ) -> Result<Vec<ColumnDef>, GridError> {
        let data = self.view_snapshot(caller, view_id).await?;
        Ok(data.columns.into_iter().collect())
    }

    pub async fn list_rows(
        &self,
        caller: &CallerContext,
        view_id: i64,
    ) -> Result<Vec<Row>, GridError> {
        let data = self.view_snapshot(caller, view_id).await?;
        Ok(data.rows.into_iter().collect())
    }

    /// Most recently created row of the view, if any.
    pub async fn latest_row(
        &self,
        caller: &CallerContext,
        view_id: i64,
    ) -> Result<Option<Row>, GridError> {
        let data = self.view_snapshot(caller, view_id).await?;
        Ok(data.rows.last().cloned())
    }

    pub async fn list_views(&self, caller: &CallerContext) -> Result<Vec<ViewMeta>, GridError> {
        if let Some(list) = self.cache.lists.fresh(&caller.caller_id) {
            return Ok(list.into_iter().collect());
        }
        let generation = self.cache.lists.generation(caller.caller_id.clone());
        let views = self.views.list(caller).await?;
        self.cache.lists.install(
            caller.caller_id.clone(),
            generation,
            views.iter().cloned().collect(),
        );
        Ok(views)
    }

    pub async fn create_view(
        &self,
        caller: &CallerContext,
        name: &str,
    ) -> Result<ViewMeta, GridError> {
        self.create_view_with(caller, name, |_| {}).await
    }

    /// Create a view, invoking `continuation` with the authoritative meta once
    /// the store confirms. The continuation is where callers chain work that
    /// needs the real id, like navigating to the new view.
    pub async fn create_view_with(
        &self,
        caller: &CallerContext,
        name: &str,
        continuation: impl FnOnce(&ViewMeta),
    ) -> Result<ViewMeta, GridError> {
        let temp_id = self.next_temp_id();
        let temp_owner = caller.caller_id.clone();
        let temp_name = name.trim().to_string();
        let commit = self.views.create(caller, name);
        run_mutation(
            &self.cache.lists,
            caller.caller_id.clone(),
            |list| {
                let order = list.len() as u32;
                list.push_back(ViewMeta {
                    id: temp_id,
                    name: temp_name,
                    owner_id: temp_owner,
                    order,
                    created_at: Utc::now(),
                });
            },
            commit,
            |list, stored| {
                if let Some(entry) = list.iter_mut().find(|v| v.id == temp_id) {
                    *entry = stored.clone();
                }
            },
            continuation,
            |generation| self.schedule_list_refetch(caller, generation),
        )
        .await
    }

    pub async fn rename_view(
        &self,
        caller: &CallerContext,
        view_id: i64,
        name: &str,
    ) -> Result<ViewMeta, GridError> {
        let optimistic_name = name.trim().to_string();
        let commit = self.views.rename(caller, view_id, name);
        let stored = run_mutation(
            &self.cache.lists,
            caller.caller_id.clone(),
            |list| {
                if let Some(entry) = list.iter_mut().find(|v| v.id == view_id) {
                    entry.name = optimistic_name;
                }
            },
            commit,
            |list, stored| {
                if let Some(entry) = list.iter_mut().find(|v| v.id == view_id) {
                    *entry = stored.clone();
                }
            },
            |_| {},
            |generation| self.schedule_list_refetch(caller, generation),
        )
        .await?;
        // The per-view snapshot carries the same meta.
        self.cache
            .views
            .patch(&view_id, |data| data.view = stored.clone());
        self.cache.views.invalidate(&view_id);
        Ok(stored)
    }

    /// Delete a view and everything under it. On confirmation the per-view
    /// cache slot is torn down together with any refetch still in flight.
    pub async fn delete_view(&self, caller: &CallerContext, view_id: i64) -> Result<(), GridError> {
        let commit = self.views.delete(caller, view_id);
        run_mutation(
            &self.cache.lists,
            caller.caller_id.clone(),
            |list| list.retain(|v| v.id != view_id),
            commit,
            |_, _| {},
            |_| self.cache.views.remove(&view_id),
            |generation| self.schedule_list_refetch(caller, generation),
        )
        .await
    }

    /// Add a column to a view. The raw default is coerced before the protocol
    /// begins, so an unparseable default never reaches the cache or the store;
    /// the optimistic apply mirrors the store-side backfill.
    pub async fn add_column(
        &self,
        caller: &CallerContext,
        view_id: i64,
        spec: ColumnSpec,
    ) -> Result<ColumnDef, GridError> {
        let default = spec
            .default
            .as_deref()
            .map(|raw| codec::encode(raw, spec.field_type))
            .transpose()?;

        let temp_id = self.next_temp_id();
        let optimistic_def = ColumnDef {
            id: temp_id,
            view_id,
            owner_id: caller.caller_id.clone(),
            name: spec.name.clone(),
            field_type: spec.field_type,
            is_required: spec.is_required,
            default_value: default.as_ref().map(codec::display_value),
        };
        let optimistic_default = default.clone();

        let commit = self.registry.add_column(
            caller,
            view_id,
            &spec.name,
            spec.field_type,
            spec.is_required,
            default,
        );
        run_mutation(
            &self.cache.views,
            view_id,
            |data| {
                data.columns.push_back(optimistic_def);
                if let Some(value) = optimistic_default {
                    let now = Utc::now();
                    for row in data.rows.iter_mut() {
                        row.fields.insert(spec.name.clone(), value.clone());
                        row.updated_at = now;
                    }
                }
            },
            commit,
            |data, stored| {
                if let Some(entry) = data.columns.iter_mut().find(|c| c.id == temp_id) {
                    *entry = stored.clone();
                }
            },
            |_| {},
            |generation| self.schedule_view_refetch(caller, view_id, generation),
        )
        .await
    }

    pub async fn remove_column(
        &self,
        caller: &CallerContext,
        view_id: i64,
        name: &str,
    ) -> Result<(), GridError> {
        let commit = self.registry.remove_column(caller, view_id, name);
        run_mutation(
            &self.cache.views,
            view_id,
            |data| {
                data.columns.retain(|c| c.name != name);
                for row in data.rows.iter_mut() {
                    row.fields.remove(name);
                }
            },
            commit,
            |_, _| {},
            |_| {},
            |generation| self.schedule_view_refetch(caller, view_id, generation),
        )
        .await
    }

    pub async fn create_row(
        &self,
        caller: &CallerContext,
        view_id: i64,
        seed: RowSeed,
    ) -> Result<Row, GridError> {
        self.create_row_with(caller, view_id, seed, |_| {}).await
    }

    /// Create a row, invoking `continuation` with the authoritative row once
    /// the store confirms. Until then the cached snapshot shows the row under
    /// a synthetic negative id.
    pub async fn create_row_with(
        &self,
        caller: &CallerContext,
        view_id: i64,
        seed: RowSeed,
        continuation: impl FnOnce(&Row),
    ) -> Result<Row, GridError> {
        let temp_id = self.next_temp_id();
        let now = Utc::now();
        let optimistic_row = Row {
            id: temp_id,
            view_id,
            owner_id: caller.caller_id.clone(),
            name: seed.name.clone(),
            created_at: now,
            updated_at: now,
            fields: seed.fields.clone(),
        };
        let commit = self.rows.create_row(caller, view_id, &seed.name, seed.fields);
        run_mutation(
            &self.cache.views,
            view_id,
            |data| data.rows.push_back(optimistic_row),
            commit,
            |data, stored| {
                if let Some(entry) = data.rows.iter_mut().find(|r| r.id == temp_id) {
                    *entry = stored.clone();
                }
            },
            continuation,
            |generation| self.schedule_view_refetch(caller, view_id, generation),
        )
        .await
    }

    /// Edit one cell from raw text input.
    ///
    /// The declared type comes from the fixed-field allowlist first, then the
    /// view's column definitions; a name matching neither is `ColumnNotFound`.
    /// The required check and coercion run before the protocol begins, so
    /// validation failures never reach the cache or the store.
    pub async fn update_cell(
        &self,
        caller: &CallerContext,
        view_id: i64,
        row_id: i64,
        column_id: &str,
        raw: &str,
    ) -> Result<Row, GridError> {
        let value = match FixedField::resolve(column_id) {
            Some(fixed) => codec::encode(raw, fixed.field_type())?,
            None => {
                let data = self.view_snapshot(caller, view_id).await?;
                let column = data
                    .columns
                    .iter()
                    .find(|c| c.name == column_id)
                    .ok_or_else(|| GridError::NotFound {
                        resource_type: ResourceType::Column,
                        resource_id: column_id.to_string(),
                    })?;
                codec::encode_cell(column, raw)?
            }
        };

        let optimistic_value = value.clone();
        let commit = self.rows.update_cell(caller, view_id, row_id, column_id, value);
        run_mutation(
            &self.cache.views,
            view_id,
            |data| apply_cell_edit(data, row_id, column_id, optimistic_value),
            commit,
            |data, stored: &Row| {
                if let Some(entry) = data.rows.iter_mut().find(|r| r.id == row_id) {
                    *entry = stored.clone();
                }
            },
            |_| {},
            |generation| self.schedule_view_refetch(caller, view_id, generation),
        )
        .await
    }

    /// Cached snapshot of a view regardless of freshness; what a renderer
    /// paints between refreshes. `None` until a read first populates the slot.
    pub fn cached_view(&self, view_id: i64) -> Option<ViewData> {
        self.cache.views.peek(&view_id)
    }

    /// Cached view list of the caller regardless of freshness.
    pub fn cached_views(&self, caller: &CallerContext) -> Option<Vec<ViewMeta>> {
        self.cache
            .lists
            .peek(&caller.caller_id)
            .map(|list| list.into_iter().collect())
    }

    /// Await every background refetch still in flight.
    pub async fn quiesce(&self) {
        self.cache.quiesce().await;
    }

    fn schedule_view_refetch(&self, caller: &CallerContext, view_id: i64, generation: u64) {
        if !self.config.background_refetch {
            return;
        }
        let views = self.views.clone();
        let registry = self.registry.clone();
        let rows = self.rows.clone();
        let cache = Arc::clone(&self.cache);
        let caller = caller.clone();
        let handle = tokio::spawn(async move {
            match fetch_view(&views, &registry, &rows, &caller, view_id).await {
                Ok(data) => cache.views.install(view_id, generation, data),
                Err(error) => warn!(
                    view_id,
                    error = %error,
                    code = error.code_str(),
                    "background view refetch failed"
                ),
            }
        });
        self.cache.views.set_inflight(view_id, handle);
    }

    fn schedule_list_refetch(&self, caller: &CallerContext, generation: u64) {
        if !self.config.background_refetch {
            return;
        }
        let views = self.views.clone();
        let cache = Arc::clone(&self.cache);
        let caller = caller.clone();
        let owner_id = caller.caller_id.clone();
        let handle = tokio::spawn(async move {
            match views.list(&caller).await {
                Ok(list) => cache.lists.install(
                    caller.caller_id.clone(),
                    generation,
                    list.into_iter().collect(),
                ),
                Err(error) => warn!(
                    owner_id = %caller.caller_id,
                    error = %error,
                    code = error.code_str(),
                    "background list refetch failed"
                ),
            }
        });
        self.cache.lists.set_inflight(owner_id, handle);
    }
}
