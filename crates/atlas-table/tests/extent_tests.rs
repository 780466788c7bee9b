//! Tests for viewport filtering through an open table.

mod common;

use std::sync::Arc;

use atlas_table::prelude::*;
use tokio::runtime::Handle;

use common::{context, init_tracing, source, ManualProvider, TestGrid};

struct Harness {
    grid: Arc<TestGrid>,
    provider: Arc<ManualProvider>,
    map: Arc<MapView>,
    source: DisplaySource,
    table: TableController,
}

impl Harness {
    fn open(json: &str) -> Self {
        init_tracing();
        let grid = TestGrid::lakes(10);
        let provider = Arc::new(ManualProvider::default());
        let map = Arc::new(MapView::new());
        map.extent.set(Some(Extent::new(0.0, 0.0, 100.0, 100.0)));
        let source = source(DisplaySourceKind::Node, 10);
        let services = ExtentServices {
            provider: provider.clone(),
            map: map.clone(),
            runtime: Handle::current(),
        };
        let table = TableController::open(context(json, grid.clone(), Some(services)), &source);
        Self {
            grid,
            provider,
            map,
            source,
            table,
        }
    }
}

fn found(ids: &[RowId]) -> LookupOutcome {
    LookupOutcome::Found(ids.iter().copied().collect())
}

/// Lets spawned lookup tasks run to completion.
async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_open_looks_up_current_extent() {
    let h = Harness::open(r#"{ "filterByExtent": true }"#);
    assert!(h.table.extent_filter_enabled());

    let requests = h.provider.requests.lock().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].layer_id, "lakes");
    assert_eq!(requests[0].viewport, Some(Extent::new(0.0, 0.0, 100.0, 100.0)));
    assert_eq!(requests[0].exclude, vec![FilterKind::Grid]);

    h.provider.reply(0, Ok(found(&[2, 4])));
    settle().await;
    assert_eq!(h.grid.displayed_ids(), vec![2, 4]);
}

#[tokio::test]
async fn test_map_filters_narrow_rows_without_extent_filtering() {
    let h = Harness::open("{}");
    assert!(!h.table.extent_filter_enabled());
    assert_eq!(h.provider.requests.lock()[0].viewport, None);

    h.provider.reply(0, Ok(found(&[1, 2, 5])));
    settle().await;
    assert_eq!(h.grid.displayed_ids(), vec![1, 2, 5]);

    // The viewport alone does not trigger lookups.
    h.map.set_extent(Extent::new(0.0, 0.0, 1.0, 1.0));
    assert_eq!(h.provider.request_count(), 1);

    h.map.filter_changed.emit(MapFilterChange {
        kind: FilterKind::Definition,
        layer_id: "lakes".to_string(),
    });
    assert_eq!(h.provider.requests.lock()[1].viewport, None);
    h.provider.reply(1, Ok(found(&[5])));
    settle().await;
    assert_eq!(h.grid.displayed_ids(), vec![5]);

    // Extent filtering can still be switched on by the user.
    assert!(h.table.set_extent_filter_enabled(true).unwrap().is_some());
    assert_eq!(
        h.provider.requests.lock()[2].viewport,
        Some(Extent::new(0.0, 0.0, 1.0, 1.0))
    );
}

#[test]
fn test_no_lookups_without_map_services() {
    let grid = TestGrid::lakes(10);
    let source = source(DisplaySourceKind::Node, 10);
    let table = TableController::open(
        context(r#"{ "filterByExtent": true }"#, grid.clone(), None),
        &source,
    );
    assert!(!table.extent_filter_enabled());
    assert!(matches!(
        table.set_extent_filter_enabled(true),
        Err(FilterError::ExtentUnavailable)
    ));
    assert_eq!(grid.displayed_ids().len(), 10);
}

#[tokio::test]
async fn test_slow_earlier_lookup_never_wins() {
    let h = Harness::open(r#"{ "filterByExtent": true }"#);
    h.map.set_extent(Extent::new(0.0, 0.0, 10.0, 10.0));
    h.map.set_extent(Extent::new(0.0, 0.0, 20.0, 20.0));
    assert_eq!(h.provider.request_count(), 3);

    h.provider.reply(2, Ok(found(&[1, 2, 3])));
    settle().await;
    h.provider.reply(1, Ok(found(&[9])));
    h.provider.reply(0, Ok(LookupOutcome::NoMatches));
    settle().await;

    assert_eq!(h.grid.displayed_ids(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_extent_and_user_filters_compose() {
    let h = Harness::open(r#"{ "filterByExtent": true }"#);
    h.provider.reply(0, Ok(found(&[1, 2, 3, 4, 5])));
    settle().await;

    h.table
        .set_column_filter("CLASS", ColumnFilterValue::text("b"))
        .unwrap();
    assert_eq!(h.grid.displayed_ids(), vec![2, 4]);

    h.map.set_extent(Extent::new(0.0, 0.0, 1.0, 1.0));
    h.provider.reply(1, Ok(LookupOutcome::NoMatches));
    settle().await;
    assert!(h.grid.displayed_ids().is_empty());

    h.map.set_extent(Extent::new(0.0, 0.0, 1.0, 1.0));
    h.provider.reply(2, Ok(LookupOutcome::Unavailable));
    settle().await;
    assert_eq!(h.grid.displayed_ids(), vec![2, 4, 6, 8, 10]);
}

#[tokio::test]
async fn test_toggling_extent_filter() {
    let h = Harness::open(r#"{ "filterByExtent": true }"#);
    h.provider.reply(0, Ok(found(&[1])));
    settle().await;

    let handle = h.table.set_extent_filter_enabled(false).unwrap().unwrap();
    h.provider.reply(1, Ok(LookupOutcome::Unavailable));
    assert!(handle.await.unwrap());
    assert_eq!(h.provider.requests.lock()[1].viewport, None);
    assert_eq!(h.grid.displayed_ids().len(), 10);

    // Viewport changes are ignored while off.
    h.map.set_extent(Extent::new(0.0, 0.0, 5.0, 5.0));
    assert_eq!(h.provider.request_count(), 2);

    h.table.set_extent_filter_enabled(true).unwrap();
    assert_eq!(
        h.provider.requests.lock()[2].viewport,
        Some(Extent::new(0.0, 0.0, 5.0, 5.0))
    );
}

#[tokio::test]
async fn test_map_filter_changes_trigger_lookups() {
    let h = Harness::open(r#"{ "filterByExtent": true }"#);
    h.map.filter_changed.emit(MapFilterChange {
        kind: FilterKind::Grid,
        layer_id: "lakes".to_string(),
    });
    assert_eq!(h.provider.request_count(), 1);

    h.map.filter_changed.emit(MapFilterChange {
        kind: FilterKind::Definition,
        layer_id: "lakes".to_string(),
    });
    assert_eq!(h.provider.request_count(), 2);
}

#[tokio::test]
async fn test_show_after_hide_looks_up_again() {
    let h = Harness::open(r#"{ "filterByExtent": true }"#);
    h.provider.reply(0, Ok(found(&[3])));
    settle().await;

    h.source.set_visible(VisibilityChange::own(false));
    assert!(h.grid.displayed_ids().is_empty());
    h.source.set_visible(VisibilityChange::own(true));
    assert_eq!(h.provider.request_count(), 2);

    h.provider.reply(1, Ok(found(&[3, 4])));
    settle().await;
    assert_eq!(h.grid.displayed_ids(), vec![3, 4]);
}

#[tokio::test]
async fn test_failed_lookup_keeps_rows() {
    let h = Harness::open(r#"{ "filterByExtent": true }"#);
    h.provider.reply(0, Ok(found(&[1, 2])));
    settle().await;

    h.map.set_extent(Extent::new(0.0, 0.0, 1.0, 1.0));
    h.provider.reply(1, Err(LookupError::Provider("service unavailable".to_string())));
    settle().await;
    assert_eq!(h.grid.displayed_ids(), vec![1, 2]);
}

#[tokio::test]
async fn test_lookup_resolving_after_close_is_dropped() {
    let h = Harness::open(r#"{ "filterByExtent": true }"#);
    h.table.close();
    assert_eq!(h.map.viewport_changed.connection_count(), 0);
    assert_eq!(h.map.filter_changed.connection_count(), 0);

    h.provider.reply(0, Ok(LookupOutcome::NoMatches));
    settle().await;
    assert_eq!(h.grid.displayed_ids().len(), 10);
}
