//! Logging facilities for Atlas Table.
//!
//! Atlas Table uses the `tracing` crate for instrumentation. To see logs,
//! install a subscriber in the host application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("atlas_table=debug")
//!     .init();
//! ```
//!
//! The constants below name the targets each subsystem logs under, so a
//! filter directive can single out, say, extent lookups.

/// Target names for log filtering.
pub mod targets {
    /// Signal/slot system target.
    pub const SIGNAL: &str = "atlas_table_core::signal";
    /// Filter session state transitions.
    pub const SESSION: &str = "atlas_table::session";
    /// Table configuration resolution.
    pub const CONFIG: &str = "atlas_table::config";
    /// Layer visibility coordination.
    pub const VISIBILITY: &str = "atlas_table::visibility";
    /// Symbol class toggle coordination.
    pub const SYMBOLOGY: &str = "atlas_table::symbology";
    /// Viewport lookups against the spatial filter provider.
    pub const EXTENT: &str = "atlas_table::extent";
    /// Grid refreshes and status computation.
    pub const GRID: &str = "atlas_table::grid";
    /// Table open/close lifecycle.
    pub const TABLE: &str = "atlas_table::table";
}

/// Span names used for tracing.
pub mod span_names {
    /// Extent lookup span.
    pub const EXTENT_LOOKUP: &str = "atlas_table::extent_lookup";
}
