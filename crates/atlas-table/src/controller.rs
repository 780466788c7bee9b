//! One open table.
//!
//! [`TableController`] owns a table's [`FilterSession`] and the coordinators
//! that feed it, and is the only way user edits reach the session. Closing
//! the controller disconnects every coordinator before anything is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use atlas_table_core::logging::targets;
use atlas_table_core::{ConnectionGuard, Signal};

use crate::column::{ColumnFilterValue, ColumnFilters};
use crate::config::{ColumnFilterSpec, ResolvedTableConfig};
use crate::error::FilterError;
use crate::extent::{ExtentCoordinator, ExtentServices};
use crate::grid::{GridBinding, GridWidget};
use crate::session::{FilterSession, QuickFilter, SharedSession};
use crate::source::{DisplaySource, GridFilter};
use crate::status::{PanelLayout, TableStatus};
use crate::symbology::SymbologyCoordinator;
use crate::visibility::{VisibilityCoordinator, VisibilityTransition};
use crate::where_clause::WhereClauseBuilder;

/// Search text shorter than this is treated as no search.
pub const MIN_SEARCH_CHARS: usize = 3;

/// Everything needed to open a table besides its display source.
#[derive(Clone)]
pub struct TableContext {
    /// Registry key.
    pub table_id: String,
    /// Attribute holding the row id.
    pub id_field: String,
    pub config: ResolvedTableConfig,
    pub grid: Arc<dyn GridWidget>,
    /// Map services. Without them the table follows neither the layer's map
    /// filters nor the viewport.
    pub extent: Option<ExtentServices>,
}

impl std::fmt::Debug for TableContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableContext")
            .field("table_id", &self.table_id)
            .field("id_field", &self.id_field)
            .field("config", &self.config)
            .field("extent", &self.extent)
            .finish_non_exhaustive()
    }
}

struct Coordinators {
    _visibility: VisibilityCoordinator,
    _symbology: Arc<SymbologyCoordinator>,
    extent: Option<Arc<ExtentCoordinator>>,
    _restore_hook: ConnectionGuard<VisibilityTransition>,
}

/// An open table: its filter session, grid binding and coordinators.
pub struct TableController {
    table_id: String,
    config: ResolvedTableConfig,
    session: SharedSession,
    binding: Arc<GridBinding>,
    grid_filter: Arc<GridFilter>,
    coordinators: Mutex<Option<Coordinators>>,
    open: AtomicBool,
}

impl TableController {
    /// Opens a table on `source`.
    ///
    /// The session starts from the configured column filters and default
    /// search, suppressed if the source is hidden. The grid is refreshed
    /// once before this returns.
    pub fn open(context: TableContext, source: &DisplaySource) -> Self {
        let TableContext {
            table_id,
            id_field,
            config,
            grid,
            extent,
        } = context;

        let mut session = FilterSession::new(config.session_settings(id_field));
        for (column, value) in config.initial_column_filters() {
            session.set_column_filter(column, value);
        }
        if config.global_search.enabled {
            session.set_text_filter(config.global_search.default_text.clone());
        }
        let session = session.into_shared();

        let layout = if config.maximized {
            PanelLayout::Maximized
        } else {
            PanelLayout::Normal
        };
        let binding = Arc::new(GridBinding::new(session.clone(), grid, layout));

        let visibility = VisibilityCoordinator::attach(session.clone(), source, binding.clone());
        let symbology = Arc::new(SymbologyCoordinator::attach(session.clone(), source, binding.clone()));
        let extent = match extent {
            Some(services) => Some(Arc::new(ExtentCoordinator::attach(
                source.id.clone(),
                session.clone(),
                binding.clone(),
                &services,
                config.filter_by_extent,
            ))),
            None => {
                if config.filter_by_extent {
                    tracing::warn!(target: targets::TABLE, table = %table_id, "extent filtering configured without map services");
                }
                None
            }
        };

        let symbology_hook = Arc::downgrade(&symbology);
        let extent_hook = extent.as_ref().map(Arc::downgrade);
        let restore_hook = visibility.restored.connect_guarded(move |_| {
            if let Some(symbology) = symbology_hook.upgrade() {
                symbology.reapply();
            }
            if let Some(extent) = extent_hook.as_ref().and_then(|weak| weak.upgrade()) {
                extent.relookup();
            }
        });

        tracing::debug!(
            target: targets::TABLE,
            table = %table_id,
            source = %source.id,
            suppressed = session.read().is_suppressed(),
            extent = extent.is_some(),
            "table opened"
        );

        let controller = Self {
            table_id,
            config,
            session,
            binding,
            grid_filter: source.grid_filter.clone(),
            coordinators: Mutex::new(Some(Coordinators {
                _visibility: visibility,
                _symbology: symbology,
                extent,
                _restore_hook: restore_hook,
            })),
            open: AtomicBool::new(true),
        };
        controller.binding.refresh();
        if controller.config.apply_map {
            controller.apply_to_map();
        }
        controller
    }

    pub fn table_id(&self) -> &str {
        &self.table_id
    }

    pub fn config(&self) -> &ResolvedTableConfig {
        &self.config
    }

    /// The filter session, for read access.
    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Emitted with the new status after every refresh.
    pub fn status_changed(&self) -> &Arc<Signal<TableStatus>> {
        &self.binding.status_changed
    }

    pub fn status(&self) -> TableStatus {
        self.binding.status()
    }

    /// Recomputes the scroll range after the grid scrolled.
    pub fn grid_scrolled(&self) {
        self.binding.publish_status();
    }

    /// Switches between the normal and maximized panel.
    pub fn set_layout(&self, layout: PanelLayout) {
        if self.binding.layout.set(layout) {
            self.binding.publish_status();
        }
    }

    /// Sets the global search text.
    ///
    /// Text shorter than [`MIN_SEARCH_CHARS`] clears the search.
    pub fn set_search_text(&self, text: &str) -> Result<(), FilterError> {
        if !self.config.global_search.enabled {
            return Err(FilterError::SearchDisabled);
        }
        let text = if text.trim().chars().count() < MIN_SEARCH_CHARS {
            ""
        } else {
            text
        };
        self.session.write().set_text_filter(text);
        self.binding.refresh();
        Ok(())
    }

    /// Sets one column's filter on behalf of the user.
    pub fn set_column_filter(&self, column: &str, value: ColumnFilterValue) -> Result<(), FilterError> {
        let spec = self.editable_column(column)?;
        if spec.kind != value.kind() {
            return Err(FilterError::KindMismatch {
                column: column.to_string(),
                expected: spec.kind,
                found: value.kind(),
            });
        }
        {
            let mut session = self.session.write();
            if value.is_empty() {
                session.clear_column_filter(column);
            } else {
                session.set_column_filter(column, value);
            }
        }
        self.binding.refresh();
        Ok(())
    }

    /// Removes one column's filter on behalf of the user.
    pub fn clear_column_filter(&self, column: &str) -> Result<(), FilterError> {
        self.editable_column(column)?;
        self.session.write().clear_column_filter(column);
        self.binding.refresh();
        Ok(())
    }

    /// Picks up column filters edited directly in the grid's header.
    ///
    /// Static columns keep their configured value and unknown columns are
    /// ignored.
    pub fn sync_from_grid(&self) {
        let model = self.binding.grid().filter_model();
        {
            let mut session = self.session.write();
            let current = session.column_filters().clone();
            for (column, spec) in &self.config.columns {
                if spec.is_static || !spec.searchable {
                    continue;
                }
                match model.get(column) {
                    Some(value) if value.kind() == spec.kind && current.get(column) != Some(value) => {
                        session.set_column_filter(column.clone(), value.clone());
                    }
                    None if current.contains_key(column) => session.clear_column_filter(column),
                    _ => {}
                }
            }
        }
        self.binding.refresh();
    }

    /// Clears the search and every non-static column filter.
    pub fn clear_filters(&self) {
        self.session.write().clear_filters(&self.config.columns);
        self.binding.refresh();
    }

    /// Whether [`clear_filters`](Self::clear_filters) would change anything.
    pub fn has_active_filters(&self) -> bool {
        self.session.read().has_active_filters(&self.config.columns)
    }

    /// Turns viewport filtering on or off.
    pub fn set_extent_filter_enabled(&self, enabled: bool) -> Result<Option<JoinHandle<bool>>, FilterError> {
        let extent = self
            .coordinators
            .lock()
            .as_ref()
            .and_then(|c| c.extent.clone())
            .ok_or(FilterError::ExtentUnavailable)?;
        Ok(extent.set_enabled(enabled))
    }

    /// Whether rows currently follow the viewport.
    pub fn extent_filter_enabled(&self) -> bool {
        self.coordinators
            .lock()
            .as_ref()
            .and_then(|c| c.extent.as_ref().map(|e| e.is_enabled()))
            .unwrap_or(false)
    }

    /// The map definition query matching the table's filters, or `None` if
    /// nothing filters. While the layer is hidden the saved filters are used.
    pub fn where_clause(&self) -> Option<String> {
        let session = self.session.read();
        let (text, columns): (&str, &ColumnFilters) = match session.saved() {
            Some(saved) => (saved.text.as_str(), &saved.columns),
            None => (
                session.text_filter().as_text().unwrap_or_default(),
                session.column_filters(),
            ),
        };
        WhereClauseBuilder::new(&self.config.columns, self.config.match_options).build(columns, text)
    }

    /// Pushes the table's filters to the layer as its grid filter.
    ///
    /// Returns whether the layer's grid filter changed.
    pub fn apply_to_map(&self) -> bool {
        if !self.is_open() {
            return false;
        }
        let query = self.where_clause();
        let changed = self.grid_filter.apply(query.clone());
        tracing::debug!(
            target: targets::TABLE,
            table = %self.table_id,
            query = query.as_deref().unwrap_or_default(),
            changed,
            "filters applied to map"
        );
        changed
    }

    /// Whether the table's filters differ from the layer's grid filter, i.e.
    /// whether [`apply_to_map`](Self::apply_to_map) would change the map.
    pub fn map_filter_outdated(&self) -> bool {
        self.where_clause() != self.grid_filter.query()
    }

    /// The current quick filter.
    pub fn quick_filter(&self) -> QuickFilter {
        self.session.read().text_filter().clone()
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Disconnects every coordinator and stops grid updates.
    ///
    /// Lookups still in flight are dropped when they resolve. Closing twice
    /// is harmless.
    pub fn close(&self) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }
        self.binding.close();
        if let Some(coordinators) = self.coordinators.lock().take() {
            if let Some(extent) = &coordinators.extent {
                extent.close();
            }
            drop(coordinators);
        }
        tracing::debug!(target: targets::TABLE, table = %self.table_id, "table closed");
    }

    fn editable_column(&self, column: &str) -> Result<&ColumnFilterSpec, FilterError> {
        let spec = self
            .config
            .columns
            .get(column)
            .filter(|spec| spec.searchable)
            .ok_or_else(|| FilterError::UnknownColumn(column.to_string()))?;
        if spec.is_static {
            return Err(FilterError::StaticColumn(column.to_string()));
        }
        Ok(spec)
    }
}

impl Drop for TableController {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for TableController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableController")
            .field("table_id", &self.table_id)
            .field("open", &self.is_open())
            .field("session", &*self.session.read())
            .finish_non_exhaustive()
    }
}
