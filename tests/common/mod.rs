//! Shared helpers for integration tests.
#![allow(dead_code)] // not every test binary uses every helper

use async_trait::async_trait;
use gridbase::GridBase;
use gridbase::caller::CallerContext;
use gridbase::catalog::schema::ColumnDef;
use gridbase::catalog::types::Row;
use gridbase::catalog::view::ViewMeta;
use gridbase::config::GridConfig;
use gridbase::error::{GridError, ResourceType};
use gridbase::store::memory::MemStore;
use gridbase::store::{GridStore, WriteOp};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Store wrapper that fails `run_atomic` on demand and counts reads, for
/// driving rollback paths and observing cache read-through.
pub struct FaultStore {
    inner: MemStore,
    /// Batches still allowed through; negative means unlimited.
    allow: AtomicI64,
    reads: AtomicUsize,
}

impl FaultStore {
    pub fn new() -> Self {
        Self {
            inner: MemStore::new(),
            allow: AtomicI64::new(-1),
            reads: AtomicUsize::new(0),
        }
    }

    /// Let `batches` more `run_atomic` calls through, then fail every later
    /// one until healed.
    pub fn fail_after(&self, batches: i64) {
        self.allow.store(batches, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.allow.store(-1, Ordering::SeqCst);
    }

    /// Read operations served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn count_read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl GridStore for FaultStore {
    async fn get_view(&self, view_id: i64) -> Result<Option<ViewMeta>, GridError> {
        self.count_read();
        self.inner.get_view(view_id).await
    }

    async fn list_views(&self, owner_id: &str) -> Result<Vec<ViewMeta>, GridError> {
        self.count_read();
        self.inner.list_views(owner_id).await
    }

    async fn count_views(&self, owner_id: &str) -> Result<u64, GridError> {
        self.inner.count_views(owner_id).await
    }

    async fn list_columns(&self, view_id: i64) -> Result<Vec<ColumnDef>, GridError> {
        self.count_read();
        self.inner.list_columns(view_id).await
    }

    async fn get_row(&self, row_id: i64) -> Result<Option<Row>, GridError> {
        self.count_read();
        self.inner.get_row(row_id).await
    }

    async fn list_rows(&self, view_id: i64) -> Result<Vec<Row>, GridError> {
        self.count_read();
        self.inner.list_rows(view_id).await
    }

    async fn allocate_id(&self, kind: ResourceType) -> Result<i64, GridError> {
        self.inner.allocate_id(kind).await
    }

    async fn run_atomic(&self, ops: Vec<WriteOp>) -> Result<(), GridError> {
        let remaining = self.allow.load(Ordering::SeqCst);
        if remaining >= 0 {
            if remaining == 0 {
                return Err(GridError::TransactionFailure("injected fault".into()));
            }
            self.allow.store(remaining - 1, Ordering::SeqCst);
        }
        self.inner.run_atomic(ops).await
    }
}

/// Store wrapper that parks the next `run_atomic` call until released, for
/// holding one mutation in its commit phase while another runs to completion.
pub struct GateStore {
    inner: MemStore,
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl GateStore {
    pub fn new() -> Self {
        Self {
            inner: MemStore::new(),
            armed: AtomicBool::new(false),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    /// Park the next `run_atomic` call at the gate.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Wait until a parked call has reached the gate.
    pub async fn parked(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl GridStore for GateStore {
    async fn get_view(&self, view_id: i64) -> Result<Option<ViewMeta>, GridError> {
        self.inner.get_view(view_id).await
    }

    async fn list_views(&self, owner_id: &str) -> Result<Vec<ViewMeta>, GridError> {
        self.inner.list_views(owner_id).await
    }

    async fn count_views(&self, owner_id: &str) -> Result<u64, GridError> {
        self.inner.count_views(owner_id).await
    }

    async fn list_columns(&self, view_id: i64) -> Result<Vec<ColumnDef>, GridError> {
        self.inner.list_columns(view_id).await
    }

    async fn get_row(&self, row_id: i64) -> Result<Option<Row>, GridError> {
        self.inner.get_row(row_id).await
    }

    async fn list_rows(&self, view_id: i64) -> Result<Vec<Row>, GridError> {
        self.inner.list_rows(view_id).await
    }

    async fn allocate_id(&self, kind: ResourceType) -> Result<i64, GridError> {
        self.inner.allocate_id(kind).await
    }

    async fn run_atomic(&self, ops: Vec<WriteOp>) -> Result<(), GridError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.run_atomic(ops).await
    }
}

pub fn caller(id: &str) -> CallerContext {
    CallerContext::new(id)
}

/// Grid over the given store with background refetches disabled, so every
/// cache state a test observes was produced by the mutation protocol alone.
pub fn open_quiet(store: Arc<dyn GridStore>) -> GridBase {
    GridBase::open(GridConfig::bulk_load(), store).expect("open grid")
}
