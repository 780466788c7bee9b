//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use atlas_table::prelude::*;
use atlas_table::{ColumnFilters, RowPredicate};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;

const LAKE_NAMES: [&str; 10] = [
    "Lake Louise",
    "Moraine Lake",
    "Emerald Lake",
    "Peyto Lake",
    "Bow Lake",
    "Maligne Lake",
    "Abraham Lake",
    "Lake Minnewanka",
    "Spray Lake",
    "Lake Agnes",
];

/// Grid holding rows in memory and counting what the predicate keeps.
pub struct TestGrid {
    rows: Vec<RowRecord>,
    predicate: Mutex<Option<RowPredicate>>,
    model: Mutex<ColumnFilters>,
    pub window: Mutex<Option<RenderedWindow>>,
}

impl TestGrid {
    /// Rows `1..=count` (at most 10) with an `OID`, a `NAME`, a `CLASS` ("A"
    /// for odd ids, "B" for even ones) and an `AREA` of `1.5 * id`.
    pub fn lakes(count: i64) -> Arc<Self> {
        let rows = (1..=count)
            .zip(LAKE_NAMES)
            .map(|(id, name)| {
                RowRecord::new()
                    .with("OID", id)
                    .with("NAME", name)
                    .with("CLASS", if id % 2 == 1 { "A" } else { "B" })
                    .with("AREA", id as f64 * 1.5)
            })
            .collect();
        Arc::new(Self {
            rows,
            predicate: Mutex::new(None),
            model: Mutex::new(ColumnFilters::new()),
            window: Mutex::new(None),
        })
    }

    pub fn displayed_ids(&self) -> Vec<RowId> {
        let predicate = self.predicate.lock().clone();
        self.rows
            .iter()
            .filter(|row| predicate.as_ref().is_none_or(|p| p(row)))
            .filter_map(|row| row.id("OID"))
            .collect()
    }
}

impl GridWidget for TestGrid {
    fn apply_predicate(&self, predicate: RowPredicate) {
        *self.predicate.lock() = Some(predicate);
    }

    fn filter_model(&self) -> ColumnFilters {
        self.model.lock().clone()
    }

    fn set_filter_model(&self, model: ColumnFilters) {
        *self.model.lock() = model;
    }

    fn displayed_row_count(&self) -> usize {
        self.displayed_ids().len()
    }

    fn total_row_count(&self) -> usize {
        self.rows.len()
    }

    fn rendered_row_window(&self) -> Option<RenderedWindow> {
        self.window.lock().clone()
    }
}

/// Class "A" draws odd ids and "B" even ids, up to `max_id`.
pub struct ParityClasses {
    pub max_id: RowId,
}

impl SymbolClassIndex for ParityClasses {
    fn row_ids_for_classes(&self, classes: &HashSet<ClassId>) -> HashSet<RowId> {
        (1..=self.max_id)
            .filter(|id| {
                let class = if id % 2 == 1 { "A" } else { "B" };
                classes.contains(class)
            })
            .collect()
    }
}

pub type Reply = std::result::Result<LookupOutcome, LookupError>;

/// Provider whose lookups resolve only when the test answers them.
#[derive(Default)]
pub struct ManualProvider {
    pub requests: Mutex<Vec<LookupRequest>>,
    replies: Mutex<Vec<Option<oneshot::Sender<Reply>>>>,
}

impl ManualProvider {
    /// Answers the `index`-th request.
    pub fn reply(&self, index: usize, reply: Reply) {
        if let Some(sender) = self.replies.lock().get_mut(index).and_then(Option::take) {
            let _ = sender.send(reply);
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl SpatialFilterProvider for ManualProvider {
    fn query_row_ids(&self, request: LookupRequest) -> BoxFuture<'static, Reply> {
        let (tx, rx) = oneshot::channel();
        self.requests.lock().push(request);
        self.replies.lock().push(Some(tx));
        async move { rx.await.unwrap_or(Err(LookupError::Cancelled)) }.boxed()
    }
}

/// Routes the crate's logs to the test output. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn fields() -> Vec<FieldInfo> {
    vec![
        FieldInfo::new("OID", FieldType::from_esri("esriFieldTypeOID")),
        FieldInfo::new("NAME", FieldType::from_esri("esriFieldTypeString")),
        FieldInfo::new("CLASS", FieldType::from_esri("esriFieldTypeString")),
        FieldInfo::new("AREA", FieldType::from_esri("esriFieldTypeDouble")),
        FieldInfo::new("SHAPE", FieldType::from_esri("esriFieldTypeGeometry")),
    ]
}

pub fn context(json: &str, grid: Arc<TestGrid>, extent: Option<ExtentServices>) -> TableContext {
    let config = ColumnFilterConfigResolver::new(&fields())
        .resolve(&TableConfig::from_json(json).expect("valid config json"))
        .expect("config resolves");
    TableContext {
        table_id: "lakes".to_string(),
        id_field: "OID".to_string(),
        config,
        grid,
        extent,
    }
}

pub fn source(kind: DisplaySourceKind, max_id: RowId) -> DisplaySource {
    DisplaySource::new("lakes", kind, Arc::new(ParityClasses { max_id }))
}

pub fn classes(ids: &[&str]) -> SymbolToggle {
    SymbolToggle {
        active_class_ids: Some(ids.iter().map(|id| id.to_string()).collect()),
        has_custom_definition_query: false,
    }
}

pub fn all_classes_on() -> SymbolToggle {
    SymbolToggle::default()
}
