//! Collaborators on the map side of a table.
//!
//! A table is bound to a [`DisplaySource`] (the legend entry for its layer)
//! and, when viewport filtering is on, to a [`MapView`]. Both are owned by
//! the host application; the table only connects to their signals and reads
//! their properties.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use atlas_table_core::{Property, Signal};

use crate::row::RowId;

/// Identifier of a symbol class in a layer's renderer.
pub type ClassId = String;

/// Where the bound legend entry sits in the legend tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplaySourceKind {
    /// A standalone entry.
    Node,
    /// One member of a mutually exclusive group: showing one member hides
    /// the others.
    GroupMember {
        /// Identifier of the group.
        group_id: String,
    },
}

/// Why a source's visibility changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityOrigin {
    /// The entry itself was toggled.
    Own,
    /// The entry's exclusive group toggled it (another member was selected,
    /// or the whole group was shown or hidden).
    Group,
}

/// Payload of [`DisplaySource::visibility_changed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityChange {
    pub visible: bool,
    pub origin: VisibilityOrigin,
}

impl VisibilityChange {
    /// A change of the entry's own checkbox.
    pub fn own(visible: bool) -> Self {
        Self {
            visible,
            origin: VisibilityOrigin::Own,
        }
    }

    /// A change driven by the entry's group.
    pub fn group(visible: bool) -> Self {
        Self {
            visible,
            origin: VisibilityOrigin::Group,
        }
    }
}

/// Payload of [`DisplaySource::symbol_toggle_changed`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolToggle {
    /// Classes still switched on, or `None` when every class is back on and
    /// symbology no longer restricts rows.
    pub active_class_ids: Option<HashSet<ClassId>>,
    /// The layer carries a definition query built outside the symbol stack.
    pub has_custom_definition_query: bool,
}

/// Resolves symbol classes to the rows drawn with them.
pub trait SymbolClassIndex: Send + Sync {
    /// Ids of the rows drawn by any of `classes`.
    fn row_ids_for_classes(&self, classes: &HashSet<ClassId>) -> HashSet<RowId>;
}

/// The legend entry a table is bound to.
pub struct DisplaySource {
    /// Layer id; also the key the map uses for per-layer filters.
    pub id: String,
    pub kind: DisplaySourceKind,
    /// Current visibility.
    pub visible: Property<bool>,
    /// Current symbol class state.
    pub symbols: Property<SymbolToggle>,
    pub visibility_changed: Arc<Signal<VisibilityChange>>,
    pub symbol_toggle_changed: Arc<Signal<SymbolToggle>>,
    /// Definition query the table pushed to the layer.
    pub grid_filter: Arc<GridFilter>,
    classes: Arc<dyn SymbolClassIndex>,
}

impl DisplaySource {
    /// Creates a visible source.
    pub fn new(id: impl Into<String>, kind: DisplaySourceKind, classes: Arc<dyn SymbolClassIndex>) -> Self {
        Self {
            id: id.into(),
            kind,
            visible: Property::new(true),
            symbols: Property::default(),
            visibility_changed: Arc::new(Signal::new()),
            symbol_toggle_changed: Arc::new(Signal::new()),
            grid_filter: Arc::new(GridFilter::default()),
            classes,
        }
    }

    /// Ids of the rows drawn by the active classes.
    pub fn row_ids_for_active_symbol_classes(&self, classes: &HashSet<ClassId>) -> HashSet<RowId> {
        self.classes.row_ids_for_classes(classes)
    }

    /// The class index, for slots that outlive a borrow of the source.
    pub fn class_index(&self) -> Arc<dyn SymbolClassIndex> {
        Arc::clone(&self.classes)
    }

    /// Updates visibility and emits the change if there was one.
    pub fn set_visible(&self, change: VisibilityChange) {
        if self.visible.set(change.visible) {
            self.visibility_changed.emit(change);
        }
    }

    /// Updates the symbol class state and emits it if it changed.
    pub fn set_symbols(&self, toggle: SymbolToggle) {
        if self.symbols.set(toggle.clone()) {
            self.symbol_toggle_changed.emit(toggle);
        }
    }
}

impl fmt::Debug for DisplaySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplaySource")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("visible", &self.visible)
            .field("symbols", &self.symbols)
            .finish_non_exhaustive()
    }
}

/// The layer's grid filter: the definition query a table applied to the map.
///
/// The map host listens on [`changed`](Self::changed) and installs the query
/// as the layer's [`FilterKind::Grid`] filter.
#[derive(Debug, Default)]
pub struct GridFilter {
    query: Property<Option<String>>,
    /// Emitted with the new query whenever it changes.
    pub changed: Signal<Option<String>>,
}

impl GridFilter {
    /// The query currently applied; `None` when the layer is unfiltered.
    pub fn query(&self) -> Option<String> {
        self.query.get()
    }

    /// Applies `query`. Returns whether it differed from the applied one.
    pub fn apply(&self, query: Option<String>) -> bool {
        let changed = self.query.set(query.clone());
        if changed {
            self.changed.emit(query);
        }
        changed
    }
}

/// Map rectangle in map units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Extent {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }
}

/// Kinds of filter the map keeps per layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    /// Pushed by the table itself ("apply to map").
    Grid,
    /// Viewport restriction.
    Extent,
    /// Symbol class visibility.
    Symbol,
    /// Layer definition query.
    Definition,
    /// Set by a host application through its API.
    Api,
}

/// Payload of [`MapView::filter_changed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapFilterChange {
    pub kind: FilterKind,
    pub layer_id: String,
}

/// The map a table follows for viewport filtering.
#[derive(Debug, Default)]
pub struct MapView {
    /// Emitted after the viewport settles.
    pub viewport_changed: Arc<Signal<Extent>>,
    /// Emitted when any layer filter changes.
    pub filter_changed: Arc<Signal<MapFilterChange>>,
    /// Last settled viewport.
    pub extent: Property<Option<Extent>>,
}

impl MapView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new viewport and announces it.
    pub fn set_extent(&self, extent: Extent) {
        self.extent.set_silent(Some(extent));
        self.viewport_changed.emit(extent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct NoClasses;

    impl SymbolClassIndex for NoClasses {
        fn row_ids_for_classes(&self, _classes: &HashSet<ClassId>) -> HashSet<RowId> {
            HashSet::new()
        }
    }

    #[test]
    fn test_set_visible_emits_only_on_change() {
        let source = DisplaySource::new("lakes", DisplaySourceKind::Node, Arc::new(NoClasses));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        source.visibility_changed.connect(move |change| seen_clone.lock().push(*change));

        source.set_visible(VisibilityChange::own(true));
        source.set_visible(VisibilityChange::own(false));
        source.set_visible(VisibilityChange::group(false));
        source.set_visible(VisibilityChange::group(true));

        assert_eq!(
            *seen.lock(),
            vec![VisibilityChange::own(false), VisibilityChange::group(true)]
        );
        assert!(source.visible.get());
    }

    #[test]
    fn test_set_symbols_emits_only_on_change() {
        let source = DisplaySource::new("lakes", DisplaySourceKind::Node, Arc::new(NoClasses));
        let count = Arc::new(Mutex::new(0));
        let count_clone = count.clone();
        source.symbol_toggle_changed.connect(move |_| *count_clone.lock() += 1);

        let toggle = SymbolToggle {
            active_class_ids: Some(HashSet::from(["A".to_string()])),
            has_custom_definition_query: false,
        };
        source.set_symbols(toggle.clone());
        source.set_symbols(toggle.clone());
        assert_eq!(*count.lock(), 1);
        assert_eq!(source.symbols.get(), toggle);
    }

    #[test]
    fn test_grid_filter_announces_changes() {
        let filter = GridFilter::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        filter.changed.connect(move |query| seen_clone.lock().push(query.clone()));

        assert!(filter.apply(Some("OID > 3".to_string())));
        assert!(!filter.apply(Some("OID > 3".to_string())));
        assert!(filter.apply(None));
        assert_eq!(*seen.lock(), vec![Some("OID > 3".to_string()), None]);
        assert_eq!(filter.query(), None);
    }

    #[test]
    fn test_map_view_records_extent() {
        let map = MapView::new();
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();
        map.viewport_changed.connect(move |extent| *seen_clone.lock() = Some(*extent));

        let extent = Extent::new(0.0, 0.0, 10.0, 5.0);
        map.set_extent(extent);
        assert_eq!(map.extent.get(), Some(extent));
        assert_eq!(*seen.lock(), Some(extent));
    }
}
