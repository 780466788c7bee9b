//! Row visibility and filter composition for map-bound attribute tables.
//!
//! An attribute table shown next to a map has to agree with the map about
//! which rows are visible. This crate decides that, row by row, from:
//!
//! - **User filters**: the global search and per-column filters
//! - **Layer visibility**: a hidden layer hides every row, and showing it
//!   again brings the user's filters back
//! - **Symbol classes**: switching classes off in the legend hides their rows
//! - **Map viewport**: optionally, only rows inside the current extent show
//!
//! Each of these arrives through a [`Signal`](atlas_table_core::Signal) on a
//! collaborator ([`DisplaySource`], [`MapView`]) and is handled by a
//! coordinator that mutates the table's [`FilterSession`]. The session
//! compiles a single row predicate that [`GridBinding`] hands to the grid.
//!
//! # Example
//!
//! ```
//! use std::collections::HashSet;
//! use std::sync::Arc;
//! use atlas_table::prelude::*;
//!
//! struct Classes;
//! impl SymbolClassIndex for Classes {
//!     fn row_ids_for_classes(&self, _: &HashSet<ClassId>) -> HashSet<RowId> {
//!         HashSet::new()
//!     }
//! }
//!
//! let mut session = FilterSession::new(SessionSettings {
//!     id_field: "OID".into(),
//!     ..Default::default()
//! });
//! session.set_column_filter("NAME", ColumnFilterValue::text("lake"));
//!
//! let row = RowRecord::new().with("OID", 1_i64).with("NAME", "Lake Louise");
//! assert!(session.predicate(&row));
//!
//! session.suppress();
//! assert!(!session.predicate(&row));
//! session.restore();
//! assert!(session.predicate(&row));
//!
//! let source = DisplaySource::new("lakes", DisplaySourceKind::Node, Arc::new(Classes));
//! assert!(source.visible.get());
//! ```

pub mod column;
pub mod config;
pub mod controller;
pub mod extent;
pub mod grid;
pub mod registry;
pub mod row;
pub mod session;
pub mod source;
pub mod status;
pub mod symbology;
pub mod visibility;
pub mod where_clause;

mod error;

pub use column::{ColumnFilterValue, ColumnFilters, ColumnId, ColumnKind, MatchOptions};
pub use config::{
    ColumnFilterConfigResolver, ColumnFilterSpec, ColumnSpecs, FieldInfo, FieldType, ResolvedTableConfig,
    TableConfig,
};
pub use controller::{TableContext, TableController};
pub use error::{ConfigError, Error, FilterError, LookupError, Result};
pub use extent::{ExtentCoordinator, ExtentServices, LookupOutcome, LookupRequest, SpatialFilterProvider};
pub use grid::{GridBinding, GridWidget};
pub use registry::TableRegistry;
pub use row::{FieldValue, RowId, RowRecord};
pub use session::{FilterSession, QuickFilter, RowPredicate, SessionSettings, SharedSession};
pub use source::{DisplaySource, DisplaySourceKind, Extent, GridFilter, MapView};
pub use status::{StatusReporter, TableStatus};
pub use symbology::SymbologyCoordinator;
pub use visibility::VisibilityCoordinator;

/// Prelude module with commonly used types.
pub mod prelude {
    pub use crate::column::{ColumnFilterValue, ColumnKind, MatchOptions};
    pub use crate::config::{ColumnFilterConfigResolver, FieldInfo, FieldType, TableConfig};
    pub use crate::controller::{TableContext, TableController};
    pub use crate::error::{Error, FilterError, LookupError, Result};
    pub use crate::extent::{ExtentServices, LookupOutcome, LookupRequest, SpatialFilterProvider};
    pub use crate::grid::GridWidget;
    pub use crate::registry::TableRegistry;
    pub use crate::row::{FieldValue, RowId, RowRecord};
    pub use crate::session::{FilterSession, QuickFilter, SessionSettings};
    pub use crate::source::{
        ClassId, DisplaySource, DisplaySourceKind, Extent, FilterKind, GridFilter, MapFilterChange, MapView,
        SymbolClassIndex, SymbolToggle, VisibilityChange,
    };
    pub use crate::status::{PanelLayout, RecordCount, RenderedRow, RenderedWindow, RowRange, TableStatus};
}
