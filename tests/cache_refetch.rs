mod common;

use common::{FaultStore, caller, open_quiet};
use gridbase::config::GridConfig;
use gridbase::store::memory::MemStore;
use gridbase::{GridBase, RowSeed};
use std::sync::Arc;

#[tokio::test]
async fn a_fresh_snapshot_is_served_without_store_reads() {
    let store = Arc::new(FaultStore::new());
    let grid = open_quiet(store.clone());
    let owner = caller("user-a");
    let view = grid.create_view(&owner, "Sales").await.expect("view");

    let first = grid.view_snapshot(&owner, view.id).await.expect("first");
    let after_first = store.reads();

    let second = grid.view_snapshot(&owner, view.id).await.expect("second");
    assert_eq!(second, first);
    assert_eq!(store.reads(), after_first, "fresh cache must not touch the store");

    // The derived accessors ride the same snapshot.
    grid.list_columns(&owner, view.id).await.expect("columns");
    grid.list_rows(&owner, view.id).await.expect("rows");
    grid.latest_row(&owner, view.id).await.expect("latest");
    assert_eq!(store.reads(), after_first);
}

#[tokio::test]
async fn a_mutation_patches_the_cache_but_marks_it_stale() {
    let store = Arc::new(FaultStore::new());
    let grid = open_quiet(store.clone());
    let owner = caller("user-a");
    let view = grid.create_view(&owner, "Sales").await.expect("view");
    let row = grid
        .create_row(
            &owner,
            view.id,
            RowSeed {
                name: "acme".into(),
                ..Default::default()
            },
        )
        .await
        .expect("row");
    grid.view_snapshot(&owner, view.id).await.expect("prime");

    grid.update_cell(&owner, view.id, row.id, "Status", "Inactive")
        .await
        .expect("edit");

    let cached = grid.cached_view(view.id).expect("projection");
    let edited = cached
        .rows
        .iter()
        .find(|r| r.id == row.id)
        .expect("edited row in cache");
    assert_eq!(
        edited.fields.get("Status").and_then(|v| v.as_text()),
        Some("Inactive")
    );

    // Stale slots go back to the store on the next snapshot.
    let after_edit = store.reads();
    let fresh = grid.view_snapshot(&owner, view.id).await.expect("resnapshot");
    assert!(store.reads() > after_edit);
    assert_eq!(grid.cached_view(view.id), Some(fresh));
}

#[tokio::test]
async fn background_refetch_freshens_the_slot_without_another_read() {
    let store = Arc::new(FaultStore::new());
    let grid = GridBase::open(GridConfig::default(), store.clone()).expect("open grid");
    let owner = caller("user-a");
    let view = grid.create_view(&owner, "Sales").await.expect("view");
    grid.view_snapshot(&owner, view.id).await.expect("prime");

    let row = grid
        .create_row(
            &owner,
            view.id,
            RowSeed {
                name: "fresh".into(),
                ..Default::default()
            },
        )
        .await
        .expect("row");
    grid.quiesce().await;

    let settled = store.reads();
    let snap = grid.view_snapshot(&owner, view.id).await.expect("snapshot");
    assert_eq!(store.reads(), settled, "the refetch already freshened the slot");
    assert!(snap.rows.iter().any(|r| r.id == row.id));
    assert!(snap.rows.iter().all(|r| r.id > 0), "no provisional ids after settle");
}

#[tokio::test]
async fn the_stale_projection_stays_visible_between_refreshes() {
    let grid = open_quiet(Arc::new(MemStore::new()));
    let owner = caller("user-a");
    let view = grid.create_view(&owner, "Draft").await.expect("view");
    grid.view_snapshot(&owner, view.id).await.expect("prime");

    grid.rename_view(&owner, view.id, "Final").await.expect("rename");

    let cached = grid.cached_view(view.id).expect("projection survives the rename");
    assert_eq!(cached.view.name, "Final");

    let snap = grid.view_snapshot(&owner, view.id).await.expect("snapshot");
    assert_eq!(snap.view.name, "Final");
}

#[tokio::test]
async fn view_listings_read_through_once_per_staleness() {
    let store = Arc::new(FaultStore::new());
    let grid = open_quiet(store.clone());
    let owner = caller("user-a");

    grid.list_views(&owner).await.expect("first list");
    let after_first = store.reads();
    grid.list_views(&owner).await.expect("second list");
    assert_eq!(store.reads(), after_first);

    grid.create_view(&owner, "New").await.expect("view");
    let after_create = store.reads();
    let listed = grid.list_views(&owner).await.expect("relist");
    assert!(store.reads() > after_create, "creation staled the listing");
    assert!(listed.iter().any(|v| v.name == "New"));
}
