//! Layer visibility drives suppression.
//!
//! While the bound layer is hidden the table shows nothing; when it comes
//! back the user's filters come back with it. Members of an exclusive group
//! follow the same rule for their own toggles, but a group-level show
//! restores column filters only and starts with a blank search.

use std::sync::Arc;

use atlas_table_core::logging::targets;
use atlas_table_core::{ConnectionGuard, Signal};

use crate::grid::GridBinding;
use crate::session::{FilterSession, SharedSession};
use crate::source::{DisplaySource, DisplaySourceKind, VisibilityChange, VisibilityOrigin};

/// What a visibility change did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityTransition {
    Suppressed,
    Restored,
    RestoredWithBlankSearch,
    /// Repeated event; nothing changed.
    Unchanged,
}

/// Keeps a session's suppression in step with its display source.
pub struct VisibilityCoordinator {
    /// Emitted after the session leaves suppression, so owners of the
    /// external restriction can recompute it.
    pub restored: Arc<Signal<VisibilityTransition>>,
    _connection: ConnectionGuard<VisibilityChange>,
}

impl VisibilityCoordinator {
    /// Connects to `source` and brings the session in line with the
    /// source's current visibility.
    pub fn attach(session: SharedSession, source: &DisplaySource, binding: Arc<GridBinding>) -> Self {
        let visible = source.visible.get();
        {
            let mut session = session.write();
            session.set_source_visible(visible);
            if !visible {
                tracing::debug!(target: targets::VISIBILITY, source = %source.id, "source starts hidden, suppressing");
                session.suppress();
            }
        }

        let restored = Arc::new(Signal::new());
        let kind = source.kind.clone();
        let source_id = source.id.clone();
        let restored_clone = restored.clone();
        let connection = source.visibility_changed.connect_guarded(move |change| {
            if !binding.is_open() {
                return;
            }
            let transition = apply_change(&mut session.write(), &kind, *change);
            tracing::debug!(
                target: targets::VISIBILITY,
                source = %source_id,
                visible = change.visible,
                ?transition,
                "visibility changed"
            );
            if transition == VisibilityTransition::Unchanged {
                return;
            }
            if transition != VisibilityTransition::Suppressed {
                restored_clone.emit(transition);
            }
            binding.refresh();
        });

        Self {
            restored,
            _connection: connection,
        }
    }
}

impl std::fmt::Debug for VisibilityCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisibilityCoordinator").finish_non_exhaustive()
    }
}

/// Applies one visibility change to `session`.
pub fn apply_change(
    session: &mut FilterSession,
    kind: &DisplaySourceKind,
    change: VisibilityChange,
) -> VisibilityTransition {
    session.set_source_visible(change.visible);
    let group_level = matches!(kind, DisplaySourceKind::GroupMember { .. })
        && change.origin == VisibilityOrigin::Group;
    match (change.visible, session.is_suppressed()) {
        (false, false) => {
            session.suppress();
            VisibilityTransition::Suppressed
        }
        (true, true) if group_level => {
            session.restore_with_blank_search();
            VisibilityTransition::RestoredWithBlankSearch
        }
        (true, true) => {
            session.restore();
            VisibilityTransition::Restored
        }
        _ => VisibilityTransition::Unchanged,
    }
}
