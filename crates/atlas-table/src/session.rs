//! Filter state of one open table.
//!
//! [`FilterSession`] owns everything that decides whether a row is shown:
//! the global quick filter, the per-column filters, and an optional
//! external row-id restriction imposed by symbology or viewport lookups. It
//! also implements suppression: while the bound layer is hidden, every row
//! is hidden too, and the user's filters are snapshotted so they come back
//! untouched when the layer is shown again.
//!
//! The session never talks to the grid. After every mutation it recompiles a
//! single [`RowPredicate`] that callers hand to the grid widget.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use atlas_table_core::logging::targets;

use crate::column::{normalize, ColumnFilterValue, ColumnFilters, ColumnId, ColumnMatcher, MatchOptions};
use crate::config::ColumnSpecs;
use crate::row::{RowId, RowRecord};

/// Predicate handed to the grid widget: `true` keeps the row visible.
pub type RowPredicate = Arc<dyn Fn(&RowRecord) -> bool + Send + Sync>;

/// A session shared between a table and its coordinators.
pub type SharedSession = Arc<RwLock<FilterSession>>;

/// The global (quick) filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuickFilter {
    /// Search text; empty means no restriction.
    Text(String),
    /// Matches zero rows. Used while the bound layer is hidden.
    MatchNone,
}

impl QuickFilter {
    /// The unrestricted filter.
    pub fn none() -> Self {
        Self::Text(String::new())
    }

    /// The search text, or `None` for the sentinel.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::MatchNone => None,
        }
    }
}

impl Default for QuickFilter {
    fn default() -> Self {
        Self::none()
    }
}

/// Row-id allowlist imposed by something other than the user's filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalRestriction {
    /// Whether the restriction is in force.
    pub active: bool,
    /// Allowed ids. An empty set hides everything; `None` while active only
    /// happens during suppression and restricts nothing.
    pub ids: Option<HashSet<RowId>>,
}

/// Filters captured by [`FilterSession::suppress`].
#[derive(Debug, Clone, PartialEq)]
pub struct SavedFilters {
    /// Quick filter text at suppression time.
    pub text: String,
    /// Column filters at suppression time.
    pub columns: ColumnFilters,
}

/// Static settings a session is created with.
#[derive(Debug, Clone, Default)]
pub struct SessionSettings {
    /// Attribute holding the row id.
    pub id_field: String,
    /// Configured default global search text.
    pub default_search: String,
    /// Text comparison options.
    pub match_options: MatchOptions,
    /// Columns left out of the global search.
    pub unsearchable_columns: HashSet<ColumnId>,
}

/// Current filter state for one table instance.
pub struct FilterSession {
    settings: SessionSettings,
    text_filter: QuickFilter,
    column_filters: ColumnFilters,
    restriction: ExternalRestriction,
    saved: Option<SavedFilters>,
    source_visible: bool,
    compiled: Arc<CompiledPredicate>,
}

impl FilterSession {
    /// Creates an unfiltered, visible session.
    pub fn new(settings: SessionSettings) -> Self {
        let mut session = Self {
            settings,
            text_filter: QuickFilter::none(),
            column_filters: ColumnFilters::new(),
            restriction: ExternalRestriction::default(),
            saved: None,
            source_visible: true,
            compiled: Arc::new(CompiledPredicate::default()),
        };
        session.recompile();
        session
    }

    /// Wraps the session for sharing with coordinators.
    pub fn into_shared(self) -> SharedSession {
        Arc::new(RwLock::new(self))
    }

    /// Settings the session was created with.
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// The current quick filter.
    pub fn text_filter(&self) -> &QuickFilter {
        &self.text_filter
    }

    /// The current column filters.
    pub fn column_filters(&self) -> &ColumnFilters {
        &self.column_filters
    }

    /// The current external restriction.
    pub fn external_restriction(&self) -> &ExternalRestriction {
        &self.restriction
    }

    /// Whether an external restriction is in force.
    pub fn external_restriction_active(&self) -> bool {
        self.restriction.active
    }

    /// The snapshot taken at suppression, if suppressed.
    pub fn saved(&self) -> Option<&SavedFilters> {
        self.saved.as_ref()
    }

    /// Whether rows are currently forced hidden.
    pub fn is_suppressed(&self) -> bool {
        self.saved.is_some()
    }

    /// Mirror of the bound source's own visibility.
    pub fn source_visible(&self) -> bool {
        self.source_visible
    }

    /// Records the bound source's visibility.
    pub fn set_source_visible(&mut self, visible: bool) {
        self.source_visible = visible;
    }

    /// Sets the global search text.
    ///
    /// While suppressed the text goes into the snapshot so it takes effect on
    /// restore; the sentinel stays in force until then.
    pub fn set_text_filter(&mut self, text: impl Into<String>) {
        let text = text.into();
        match self.saved.as_mut() {
            Some(saved) => saved.text = text,
            None => {
                self.text_filter = QuickFilter::Text(text);
                self.recompile();
            }
        }
    }

    /// Sets one column's filter. Values are assumed to be validated.
    pub fn set_column_filter(&mut self, column: impl Into<ColumnId>, value: ColumnFilterValue) {
        let column = column.into();
        if let Some(saved) = self.saved.as_mut() {
            saved.columns.insert(column.clone(), value.clone());
        }
        self.column_filters.insert(column, value);
        self.recompile();
    }

    /// Removes one column's filter.
    pub fn clear_column_filter(&mut self, column: &str) {
        if let Some(saved) = self.saved.as_mut() {
            saved.columns.remove(column);
        }
        if self.column_filters.remove(column).is_some() {
            self.recompile();
        }
    }

    /// Clears the search text and every non-static column filter.
    pub fn clear_filters(&mut self, specs: &ColumnSpecs) {
        let keep = |column: &ColumnId| specs.get(column).is_some_and(|spec| spec.is_static);
        if let Some(saved) = self.saved.as_mut() {
            saved.text.clear();
            saved.columns.retain(|column, _| keep(column));
        } else {
            self.text_filter = QuickFilter::none();
        }
        self.column_filters.retain(|column, _| keep(column));
        self.recompile();
    }

    /// Whether the user has any filter set that "clear filters" would remove.
    pub fn has_active_filters(&self, specs: &ColumnSpecs) -> bool {
        let text = match &self.saved {
            Some(saved) => saved.text.as_str(),
            None => self.text_filter.as_text().unwrap_or_default(),
        };
        !text.is_empty()
            || self.column_filters.iter().any(|(column, value)| {
                !value.is_empty() && !specs.get(column).is_some_and(|spec| spec.is_static)
            })
    }

    /// Hides every row, remembering the current filters.
    ///
    /// Does nothing if already suppressed. The restriction's id set is
    /// dropped, but its enabled flag is kept so whoever owns the restriction
    /// can recompute it after restore.
    pub fn suppress(&mut self) {
        if self.saved.is_some() {
            return;
        }
        let text = match std::mem::replace(&mut self.text_filter, QuickFilter::MatchNone) {
            QuickFilter::Text(text) => text,
            QuickFilter::MatchNone => String::new(),
        };
        self.saved = Some(SavedFilters {
            text,
            columns: self.column_filters.clone(),
        });
        self.restriction.ids = None;
        tracing::debug!(target: targets::SESSION, "filters suppressed");
        self.recompile();
    }

    /// Reinstates the filters saved by [`suppress`](Self::suppress).
    ///
    /// A saved empty search falls back to the configured default search.
    /// Does nothing if not suppressed.
    pub fn restore(&mut self) {
        let Some(saved) = self.saved.take() else {
            return;
        };
        let text = if saved.text.is_empty() {
            self.settings.default_search.clone()
        } else {
            saved.text
        };
        self.text_filter = QuickFilter::Text(text);
        self.column_filters = saved.columns;
        tracing::debug!(target: targets::SESSION, "filters restored");
        self.recompile();
    }

    /// Group-level restore: column filters come back, search text is blank.
    pub fn restore_with_blank_search(&mut self) {
        let Some(saved) = self.saved.take() else {
            return;
        };
        self.text_filter = QuickFilter::none();
        self.column_filters = saved.columns;
        tracing::debug!(target: targets::SESSION, "filters restored with blank search");
        self.recompile();
    }

    /// Sets or clears the external row-id restriction.
    pub fn set_external_restriction(&mut self, ids: Option<HashSet<RowId>>) {
        tracing::debug!(
            target: targets::SESSION,
            active = ids.is_some(),
            allowed = ids.as_ref().map(HashSet::len),
            "external restriction updated"
        );
        self.restriction = ExternalRestriction {
            active: ids.is_some(),
            ids,
        };
        self.recompile();
    }

    /// Whether `row` is displayed under the current filters.
    pub fn predicate(&self, row: &RowRecord) -> bool {
        self.compiled.matches(row)
    }

    /// A shareable snapshot of the current predicate.
    pub fn predicate_fn(&self) -> RowPredicate {
        let compiled = Arc::clone(&self.compiled);
        Arc::new(move |row: &RowRecord| compiled.matches(row))
    }

    fn recompile(&mut self) {
        self.compiled = Arc::new(CompiledPredicate::build(self));
    }
}

impl fmt::Debug for FilterSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterSession")
            .field("text_filter", &self.text_filter)
            .field("column_filters", &self.column_filters)
            .field("restriction", &self.restriction)
            .field("saved", &self.saved)
            .field("source_visible", &self.source_visible)
            .finish()
    }
}

/// Quick filter compiled for evaluation.
#[derive(Debug, Clone, Default)]
enum QuickMatcher {
    #[default]
    Any,
    Nothing,
    /// Every word must occur somewhere in the row's searchable text.
    Words(Vec<String>),
}

#[derive(Debug, Default)]
struct CompiledPredicate {
    id_field: String,
    options: MatchOptions,
    unsearchable: HashSet<ColumnId>,
    quick: QuickMatcher,
    columns: Vec<(ColumnId, ColumnMatcher)>,
    allowed: Option<HashSet<RowId>>,
}

impl CompiledPredicate {
    fn build(session: &FilterSession) -> Self {
        let options = session.settings.match_options;
        let quick = match &session.text_filter {
            QuickFilter::MatchNone => QuickMatcher::Nothing,
            QuickFilter::Text(text) => {
                let words: Vec<String> = normalize(text, options)
                    .split_whitespace()
                    .map(str::to_string)
                    .collect();
                if words.is_empty() {
                    QuickMatcher::Any
                } else {
                    QuickMatcher::Words(words)
                }
            }
        };
        let columns = session
            .column_filters
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(column, value)| (column.clone(), ColumnMatcher::compile(value, options)))
            .collect();
        let allowed = match &session.restriction {
            ExternalRestriction {
                active: true,
                ids: Some(ids),
            } => Some(ids.clone()),
            _ => None,
        };
        Self {
            id_field: session.settings.id_field.clone(),
            options,
            unsearchable: session.settings.unsearchable_columns.clone(),
            quick,
            columns,
            allowed,
        }
    }

    fn matches(&self, row: &RowRecord) -> bool {
        self.matches_quick(row)
            && self
                .columns
                .iter()
                .all(|(column, matcher)| matcher.matches(row.get(column), self.options))
            && self.allowed.as_ref().is_none_or(|allowed| {
                row.id(&self.id_field).is_some_and(|id| allowed.contains(&id))
            })
    }

    fn matches_quick(&self, row: &RowRecord) -> bool {
        let words = match &self.quick {
            QuickMatcher::Any => return true,
            QuickMatcher::Nothing => return false,
            QuickMatcher::Words(words) => words,
        };
        let haystack = row
            .iter()
            .filter(|(field, value)| !value.is_null() && !self.unsearchable.contains(*field))
            .map(|(_, value)| normalize(&value.to_string(), self.options).into_owned())
            .collect::<Vec<_>>()
            .join("\n");
        words.iter().all(|word| haystack.contains(word.as_str()))
    }
}
