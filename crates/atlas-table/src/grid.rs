//! The grid widget seam.
//!
//! Rendering, sorting and scrolling belong to the grid widget. The engine
//! talks to it through [`GridWidget`] and nothing else; [`GridBinding`] is the
//! one place that pushes the session's predicate and column filters into it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use atlas_table_core::logging::targets;
use atlas_table_core::{Property, Signal};

use crate::column::ColumnFilters;
use crate::session::{RowPredicate, SharedSession};
use crate::status::{PanelLayout, RenderedWindow, StatusReporter, TableStatus};

/// Operations the engine needs from a grid widget.
pub trait GridWidget: Send + Sync {
    /// Replaces the external filter and re-filters the rows.
    fn apply_predicate(&self, predicate: RowPredicate);

    /// Column filter values as shown in the header inputs.
    fn filter_model(&self) -> ColumnFilters;

    /// Updates the header inputs.
    fn set_filter_model(&self, model: ColumnFilters);

    /// Rows passing every filter.
    fn displayed_row_count(&self) -> usize;

    /// All rows of the dataset.
    fn total_row_count(&self) -> usize;

    /// Rows currently rendered, or `None` before the first render.
    fn rendered_row_window(&self) -> Option<RenderedWindow>;
}

/// Binds a session to its grid widget.
pub struct GridBinding {
    session: SharedSession,
    grid: Arc<dyn GridWidget>,
    /// Panel size, used for the default scroll range.
    pub layout: Property<PanelLayout>,
    /// Emitted after every refresh and scroll.
    pub status_changed: Arc<Signal<TableStatus>>,
    open: AtomicBool,
}

impl GridBinding {
    pub fn new(session: SharedSession, grid: Arc<dyn GridWidget>, layout: PanelLayout) -> Self {
        Self {
            session,
            grid,
            layout: Property::new(layout),
            status_changed: Arc::new(Signal::new()),
            open: AtomicBool::new(true),
        }
    }

    /// The bound grid.
    pub fn grid(&self) -> &Arc<dyn GridWidget> {
        &self.grid
    }

    /// Hands the current predicate and column filters to the grid, then
    /// publishes the new status.
    ///
    /// Does nothing once the binding is closed.
    #[tracing::instrument(skip_all, target = "atlas_table::grid", level = "trace")]
    pub fn refresh(&self) {
        if !self.is_open() {
            tracing::trace!(target: targets::GRID, "refresh after close ignored");
            return;
        }
        let (predicate, model) = {
            let session = self.session.read();
            (session.predicate_fn(), session.column_filters().clone())
        };
        if self.grid.filter_model() != model {
            self.grid.set_filter_model(model);
        }
        self.grid.apply_predicate(predicate);
        self.publish_status();
    }

    /// Recomputes the status without re-filtering, e.g. after a scroll.
    pub fn publish_status(&self) {
        if !self.is_open() {
            return;
        }
        let status = self.status();
        tracing::trace!(
            target: targets::GRID,
            displayed = status.count.displayed,
            total = status.count.total,
            range = %status.range,
            "status updated"
        );
        self.status_changed.emit(status);
    }

    /// Current status.
    pub fn status(&self) -> TableStatus {
        TableStatus {
            count: StatusReporter::compute(self.grid.total_row_count(), self.grid.displayed_row_count()),
            range: StatusReporter::visible_range(self.grid.rendered_row_window().as_ref(), self.layout.get()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Stops all further grid updates.
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.status_changed.disconnect_all();
    }
}

impl std::fmt::Debug for GridBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridBinding")
            .field("layout", &self.layout)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}
