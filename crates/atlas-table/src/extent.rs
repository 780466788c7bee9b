//! Map-side lookups drive the external restriction.
//!
//! A table bound to a map asks the [`SpatialFilterProvider`] which rows pass
//! the layer's map filters (definition queries, symbology, API filters), and
//! when it filters by extent, which of those intersect the viewport. A
//! lookup runs on open, whenever another filter of the layer changes, and,
//! with extent filtering on, on every settled viewport. Lookups are
//! asynchronous and can resolve out of order, so each one carries a sequence
//! number and only the latest is ever applied.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::Instrument;

use atlas_table_core::logging::{span_names, targets};
use atlas_table_core::{ConnectionGuard, Signal};

use crate::error::LookupError;
use crate::grid::GridBinding;
use crate::row::RowId;
use crate::session::SharedSession;
use crate::source::{Extent, FilterKind, MapFilterChange, MapView};

/// Map filters the provider must ignore: the table's own.
const EXCLUDED_FILTERS: [FilterKind; 1] = [FilterKind::Grid];

/// Result of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// These rows qualify.
    Found(HashSet<RowId>),
    /// The provider looked and found nothing.
    NoMatches,
    /// The provider has no answer yet; rows are not restricted.
    Unavailable,
}

impl LookupOutcome {
    /// The restriction this outcome imposes.
    pub fn into_restriction(self) -> Option<HashSet<RowId>> {
        match self {
            Self::Found(ids) => Some(ids),
            Self::NoMatches => Some(HashSet::new()),
            Self::Unavailable => None,
        }
    }
}

/// One query to the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupRequest {
    /// Layer whose rows are wanted.
    pub layer_id: String,
    /// Viewport to intersect; `None` applies only the other map filters.
    pub viewport: Option<Extent>,
    /// Map filters to leave out of the query.
    pub exclude: Vec<FilterKind>,
}

/// Resolves row ids against the map.
pub trait SpatialFilterProvider: Send + Sync {
    /// Starts a lookup. The future must not borrow the provider.
    fn query_row_ids(&self, request: LookupRequest) -> BoxFuture<'static, Result<LookupOutcome, LookupError>>;
}

/// The most recent outstanding lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingLookup {
    pub sequence: u64,
    pub query: LookupRequest,
}

/// Map-side services a table needs to follow the layer's map filters.
#[derive(Clone)]
pub struct ExtentServices {
    pub provider: Arc<dyn SpatialFilterProvider>,
    pub map: Arc<MapView>,
    /// Runtime the lookups run on.
    pub runtime: Handle,
}

impl std::fmt::Debug for ExtentServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtentServices").field("map", &self.map).finish_non_exhaustive()
    }
}

struct ExtentState {
    layer_id: String,
    session: SharedSession,
    binding: Arc<GridBinding>,
    provider: Arc<dyn SpatialFilterProvider>,
    runtime: Handle,
    enabled: AtomicBool,
    last_viewport: Mutex<Option<Extent>>,
    sequence: AtomicU64,
    pending: Mutex<Option<PendingLookup>>,
    lookup_failed: Arc<Signal<LookupError>>,
}

impl ExtentState {
    fn begin_lookup(&self, viewport: Option<Extent>) -> PendingLookup {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let pending = PendingLookup {
            sequence,
            query: LookupRequest {
                layer_id: self.layer_id.clone(),
                viewport,
                exclude: EXCLUDED_FILTERS.to_vec(),
            },
        };
        *self.pending.lock() = Some(pending.clone());
        pending
    }

    /// Applies a lookup result if it is still the latest. Returns whether
    /// the session changed.
    ///
    /// `pending` stays locked until the restriction is written, so a newer
    /// lookup cannot be issued and applied in between.
    fn apply_response(&self, sequence: u64, result: Result<LookupOutcome, LookupError>) -> bool {
        let mut pending = self.pending.lock();
        if !self.binding.is_open() || pending.as_ref().is_none_or(|p| p.sequence != sequence) {
            tracing::trace!(target: targets::EXTENT, sequence, "stale lookup dropped");
            return false;
        }
        *pending = None;
        match result {
            Ok(outcome) => {
                let restriction = outcome.into_restriction();
                tracing::debug!(
                    target: targets::EXTENT,
                    sequence,
                    allowed = restriction.as_ref().map(HashSet::len),
                    "extent lookup applied"
                );
                self.session.write().set_external_restriction(restriction);
                drop(pending);
                self.binding.refresh();
                true
            }
            Err(err) => {
                drop(pending);
                tracing::warn!(target: targets::EXTENT, sequence, %err, "extent lookup failed, keeping current rows");
                self.lookup_failed.emit(err);
                false
            }
        }
    }

    fn spawn_lookup(self: &Arc<Self>, viewport: Option<Extent>) -> JoinHandle<bool> {
        let pending = self.begin_lookup(viewport);
        let sequence = pending.sequence;
        let future = self.provider.query_row_ids(pending.query);
        let state: Weak<Self> = Arc::downgrade(self);
        let span = tracing::trace_span!(target: targets::EXTENT, span_names::EXTENT_LOOKUP, sequence);
        self.runtime.spawn(
            async move {
                let result = future.await;
                match state.upgrade() {
                    Some(state) => state.apply_response(sequence, result),
                    None => false,
                }
            }
            .instrument(span),
        )
    }

    fn current_viewport(&self) -> Option<Extent> {
        if self.enabled.load(Ordering::SeqCst) {
            *self.last_viewport.lock()
        } else {
            None
        }
    }
}

/// Keeps a session's external restriction in step with the map's filters
/// and, optionally, its viewport.
pub struct ExtentCoordinator {
    state: Arc<ExtentState>,
    /// Emitted when the provider fails a lookup that was still current.
    pub lookup_failed: Arc<Signal<LookupError>>,
    _viewport_connection: ConnectionGuard<Extent>,
    _filter_connection: ConnectionGuard<MapFilterChange>,
}

impl ExtentCoordinator {
    /// Connects to the map and issues the initial lookup, for the current
    /// extent if `filter_by_extent` is set.
    pub fn attach(
        layer_id: impl Into<String>,
        session: SharedSession,
        binding: Arc<GridBinding>,
        services: &ExtentServices,
        filter_by_extent: bool,
    ) -> Self {
        let lookup_failed = Arc::new(Signal::new());
        let state = Arc::new(ExtentState {
            layer_id: layer_id.into(),
            session,
            binding,
            provider: services.provider.clone(),
            runtime: services.runtime.clone(),
            enabled: AtomicBool::new(filter_by_extent),
            last_viewport: Mutex::new(services.map.extent.get()),
            sequence: AtomicU64::new(0),
            pending: Mutex::new(None),
            lookup_failed: lookup_failed.clone(),
        });

        let viewport_state = Arc::downgrade(&state);
        let viewport_connection = services.map.viewport_changed.connect_guarded(move |extent| {
            let Some(state) = viewport_state.upgrade() else {
                return;
            };
            *state.last_viewport.lock() = Some(*extent);
            if state.enabled.load(Ordering::SeqCst) && state.binding.is_open() {
                state.spawn_lookup(Some(*extent));
            }
        });

        let filter_state = Arc::downgrade(&state);
        let filter_connection = services.map.filter_changed.connect_guarded(move |change| {
            let Some(state) = filter_state.upgrade() else {
                return;
            };
            if change.kind == FilterKind::Grid || change.layer_id != state.layer_id || !state.binding.is_open() {
                return;
            }
            tracing::debug!(target: targets::EXTENT, kind = ?change.kind, "map filter changed, looking up rows again");
            state.spawn_lookup(state.current_viewport());
        });

        let coordinator = Self {
            state,
            lookup_failed,
            _viewport_connection: viewport_connection,
            _filter_connection: filter_connection,
        };
        coordinator.relookup();
        coordinator
    }

    /// Whether rows follow the viewport.
    pub fn is_enabled(&self) -> bool {
        self.state.enabled.load(Ordering::SeqCst)
    }

    /// Turns viewport filtering on or off and looks rows up again.
    ///
    /// Turned off, lookups still apply the layer's other map filters.
    pub fn set_enabled(&self, enabled: bool) -> Option<JoinHandle<bool>> {
        if self.state.enabled.swap(enabled, Ordering::SeqCst) == enabled {
            return None;
        }
        tracing::debug!(target: targets::EXTENT, enabled, "extent filter toggled");
        self.relookup()
    }

    /// Issues a lookup for the current viewport.
    pub fn relookup(&self) -> Option<JoinHandle<bool>> {
        if !self.state.binding.is_open() {
            return None;
        }
        Some(self.state.spawn_lookup(self.state.current_viewport()))
    }

    /// Issues a lookup for `viewport` and records it as the latest.
    pub fn lookup(&self, viewport: Extent) -> JoinHandle<bool> {
        *self.state.last_viewport.lock() = Some(viewport);
        self.state.spawn_lookup(Some(viewport))
    }

    /// The outstanding lookup, if any.
    pub fn pending(&self) -> Option<PendingLookup> {
        self.state.pending.lock().clone()
    }

    /// Drops the outstanding lookup so its response is ignored.
    pub fn close(&self) {
        self.state.sequence.fetch_add(1, Ordering::SeqCst);
        self.state.pending.lock().take();
    }
}

impl std::fmt::Debug for ExtentCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtentCoordinator")
            .field("layer_id", &self.state.layer_id)
            .field("enabled", &self.is_enabled())
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}
