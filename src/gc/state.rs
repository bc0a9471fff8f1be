//! Process-wide collector state and deferral scopes.

use parking_lot::{const_mutex, Mutex};
use tracing::{debug, trace, warn};

use super::collector::{self, CollectionStats};
use crate::object::ErasedObject;

struct CollectorState {
    /// Nesting depth of deferral scopes.
    depth: usize,
    /// A collection pass is running; new hand-overs queue up behind it.
    collecting: bool,
    /// When false, hand-overs outside deferral fall back to plain release.
    enabled: bool,
    /// References handed over and not yet examined, in arrival order.
    pending: Vec<ErasedObject>,
}

static STATE: Mutex<CollectorState> =
    const_mutex(CollectorState { depth: 0, collecting: false, enabled: true, pending: Vec::new() });

/// Called when an owner of a participating object lets go.
///
/// Returns true if the collector took over the reference, in which case the
/// caller must not decrement the count itself.
pub(crate) fn give_reference(object: ErasedObject) -> bool {
    if !object.header.is_alive() {
        // A reference into garbage being torn down; the count is already
        // accounted for by the running pass.
        return true;
    }

    let mut state = STATE.lock();
    if state.depth > 0 || state.collecting {
        trace!(class = object.value.class_name(), depth = state.depth, "gc.defer");
        state.pending.push(object);
        return true;
    }
    if !state.enabled || object.header.reference_count() <= 1 {
        drop(state);
        return false;
    }

    state.pending.push(object);
    state.collecting = true;
    drop(state);

    run_pending();
    true
}

/// Drain the pending queue, one collection pass per batch, until it stays empty.
fn run_pending() -> CollectionStats {
    let mut total = CollectionStats::default();
    loop {
        let (roots, enabled) = {
            let mut state = STATE.lock();
            if state.pending.is_empty() {
                state.collecting = false;
                break;
            }
            (std::mem::take(&mut state.pending), state.enabled)
        };

        let stats = if enabled {
            collector::collect_roots(roots)
        } else {
            collector::release_roots(roots)
        };
        total.absorb(stats);
    }
    if total.candidates > 0 {
        debug!(candidates = total.candidates, garbage = total.garbage, "gc.collect");
    }
    total
}

/// Enter a deferral scope: released references are queued, not examined.
pub fn deferred_collection_push() {
    let mut state = STATE.lock();
    state.depth += 1;
    trace!(depth = state.depth, "gc.push");
}

/// Leave a deferral scope. Leaving the outermost scope runs one collection
/// over everything queued while deferred.
pub fn deferred_collection_pop() -> CollectionStats {
    let mut state = STATE.lock();
    if state.depth == 0 {
        warn!("gc.pop without matching push");
        return CollectionStats::default();
    }
    state.depth -= 1;
    trace!(depth = state.depth, "gc.pop");
    if state.depth > 0 || state.collecting || state.pending.is_empty() {
        return CollectionStats::default();
    }
    state.collecting = true;
    drop(state);
    run_pending()
}

/// Current nesting depth of deferral scopes.
#[must_use]
pub fn deferral_depth() -> usize {
    STATE.lock().depth
}

/// Examine everything queued so far, unless a deferral scope is active.
pub fn collect() -> CollectionStats {
    let mut state = STATE.lock();
    if state.depth > 0 || state.collecting || state.pending.is_empty() {
        return CollectionStats::default();
    }
    state.collecting = true;
    drop(state);
    run_pending()
}

/// Turn cycle detection on or off.
///
/// With detection off, releasing a participant never searches for cycles, so
/// cycles leak. Deferral scopes still queue releases.
pub fn set_enabled(enabled: bool) {
    STATE.lock().enabled = enabled;
}

/// Whether cycle detection is on.
#[must_use]
pub fn is_enabled() -> bool {
    STATE.lock().enabled
}

/// Scoped deferral: pushes on creation, pops on drop.
///
/// ```
/// use trueno_flow::gc::{deferral_depth, DeferredCollection};
///
/// {
///     let _guard = DeferredCollection::new();
///     assert!(deferral_depth() >= 1);
/// }
/// ```
#[derive(Debug)]
#[must_use = "the deferral scope ends when the guard is dropped"]
pub struct DeferredCollection {
    _private: (),
}

impl DeferredCollection {
    /// Enter a deferral scope.
    pub fn new() -> Self {
        deferred_collection_push();
        Self { _private: () }
    }
}

impl Default for DeferredCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DeferredCollection {
    fn drop(&mut self) {
        deferred_collection_pop();
    }
}
