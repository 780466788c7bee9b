//! Symbol class toggles drive the external restriction.
//!
//! Switching symbol classes off in the legend hides the matching features on
//! the map; the table follows by restricting rows to the ids drawn with the
//! classes still on.

use std::sync::Arc;

use parking_lot::Mutex;

use atlas_table_core::logging::targets;
use atlas_table_core::ConnectionGuard;

use crate::grid::GridBinding;
use crate::session::{FilterSession, SharedSession};
use crate::source::{DisplaySource, SymbolClassIndex, SymbolToggle};

/// What a toggle did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbologyAction {
    /// Rows restricted to the active classes.
    Restricted {
        /// The session was suppressed and came back first.
        restored: bool,
    },
    /// The restriction was dropped.
    Cleared,
    Unchanged,
}

#[derive(Debug, Default)]
struct Toggles {
    last: Option<SymbolToggle>,
    /// Every class went off while the layer was shown, so the map hid it.
    hidden_by_classes: bool,
}

struct SymbologyState {
    session: SharedSession,
    binding: Arc<GridBinding>,
    classes: Arc<dyn SymbolClassIndex>,
    toggles: Mutex<Toggles>,
}

impl SymbologyState {
    fn record(&self, toggle: &SymbolToggle) -> SymbologyAction {
        let mut toggles = self.toggles.lock();
        let mut session = self.session.write();
        let action = apply_toggle(&mut session, self.classes.as_ref(), toggle, toggles.hidden_by_classes);
        toggles.hidden_by_classes = match &toggle.active_class_ids {
            Some(active) if active.is_empty() => toggles.hidden_by_classes || !session.is_suppressed(),
            _ => false,
        };
        toggles.last = Some(toggle.clone());
        action
    }

    fn handle(&self, toggle: &SymbolToggle) {
        if !self.binding.is_open() {
            return;
        }
        let action = self.record(toggle);
        tracing::debug!(
            target: targets::SYMBOLOGY,
            active_classes = toggle.active_class_ids.as_ref().map(|ids| ids.len()),
            custom_query = toggle.has_custom_definition_query,
            ?action,
            "symbol classes toggled"
        );
        if action != SymbologyAction::Unchanged {
            self.binding.refresh();
        }
    }
}

/// Keeps a session's external restriction in step with symbol toggles.
pub struct SymbologyCoordinator {
    state: Arc<SymbologyState>,
    _connection: ConnectionGuard<SymbolToggle>,
}

impl SymbologyCoordinator {
    /// Connects to `source` and restricts rows to the classes the source
    /// currently draws.
    pub fn attach(session: SharedSession, source: &DisplaySource, binding: Arc<GridBinding>) -> Self {
        let state = Arc::new(SymbologyState {
            session,
            binding,
            classes: source.class_index(),
            toggles: Mutex::new(Toggles::default()),
        });

        let current = source.symbols.get();
        if current.active_class_ids.is_some() {
            let action = state.record(&current);
            tracing::debug!(target: targets::SYMBOLOGY, source = %source.id, ?action, "source starts with classes off");
        }

        let slot_state = state.clone();
        let connection = source
            .symbol_toggle_changed
            .connect_guarded(move |toggle| slot_state.handle(toggle));
        Self {
            state,
            _connection: connection,
        }
    }

    /// The most recent toggle seen.
    pub fn last_toggle(&self) -> Option<SymbolToggle> {
        self.state.toggles.lock().last.clone()
    }

    /// Re-applies the last toggle that restricted rows.
    ///
    /// Suppression drops the restriction's ids; this puts them back once the
    /// session is restored.
    pub fn reapply(&self) {
        let Some(toggle) = self.last_toggle() else {
            return;
        };
        if toggle.active_class_ids.is_some() && !self.state.session.read().is_suppressed() {
            self.state.handle(&toggle);
        }
    }
}

impl std::fmt::Debug for SymbologyCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbologyCoordinator")
            .field("toggles", &*self.state.toggles.lock())
            .finish_non_exhaustive()
    }
}

/// Applies one toggle to `session`.
///
/// A suppressed session comes back only when `hidden_by_classes` says the
/// layer went dark because every class was switched off; a layer the user
/// hid stays hidden whatever its classes do.
pub fn apply_toggle(
    session: &mut FilterSession,
    classes: &dyn SymbolClassIndex,
    toggle: &SymbolToggle,
    hidden_by_classes: bool,
) -> SymbologyAction {
    match &toggle.active_class_ids {
        Some(active) => {
            let restored = hidden_by_classes && session.is_suppressed() && !active.is_empty();
            if restored {
                session.restore();
            }
            session.set_external_restriction(Some(classes.row_ids_for_classes(active)));
            SymbologyAction::Restricted { restored }
        }
        None if !toggle.has_custom_definition_query && session.external_restriction_active() => {
            session.set_external_restriction(None);
            SymbologyAction::Cleared
        }
        None => SymbologyAction::Unchanged,
    }
}
