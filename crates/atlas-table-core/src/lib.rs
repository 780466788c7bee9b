//! Core plumbing for Atlas Table.
//!
//! This crate provides the small reactive toolkit the table engine is wired
//! together with:
//!
//! - **Signal/Slot System**: Type-safe notification from map collaborators to
//!   the coordinators that keep a table's rows in sync
//! - **Connection Guards**: RAII disconnection so a closed table never sees
//!   another callback
//! - **Property System**: Shared values with change detection
//! - **Logging**: `tracing` target names for each subsystem
//!
//! # Signal/Slot Example
//!
//! ```
//! use atlas_table_core::Signal;
//!
//! // A layer's visibility toggle
//! let visibility_changed = Signal::<bool>::new();
//!
//! let conn_id = visibility_changed.connect(|visible| {
//!     println!("Layer visible: {}", visible);
//! });
//!
//! visibility_changed.emit(false);
//! visibility_changed.disconnect(conn_id);
//! ```
//!
//! # Scoped Connections
//!
//! ```
//! use atlas_table_core::Signal;
//! use std::sync::Arc;
//!
//! let viewport_changed = Arc::new(Signal::<(f64, f64, f64, f64)>::new());
//! {
//!     let _guard = viewport_changed.connect_guarded(|extent| {
//!         println!("Viewport moved to {:?}", extent);
//!     });
//!     viewport_changed.emit((0.0, 0.0, 10.0, 10.0));
//! }
//! // The guard was dropped, so nothing is listening any more.
//! assert_eq!(viewport_changed.connection_count(), 0);
//! ```

pub mod logging;
pub mod property;
pub mod signal;

pub use property::Property;
pub use signal::{ConnectionGuard, ConnectionId, Signal};
