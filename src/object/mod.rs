//! Reference-counted object model.
//!
//! Every pipeline-visible object lives behind a [`Ref`] handle. Cloning a
//! handle registers a new owner, dropping it unregisters one; the object is
//! destroyed exactly once, when the last owner lets go. Objects that can take
//! part in reference cycles opt into the cycle collector in [`crate::gc`] by
//! overriding [`Object::uses_garbage_collector`] and reporting their outgoing
//! strong references.
//!
//! # Example
//!
//! ```
//! use trueno_flow::object::{Event, Object, Ref};
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//!
//! struct Blob;
//! impl Object for Blob {}
//!
//! let deleted = Arc::new(AtomicBool::new(false));
//! let flag = Arc::clone(&deleted);
//!
//! let blob = Ref::new(Blob);
//! blob.add_observer(Event::Delete, move |_| flag.store(true, Ordering::SeqCst));
//! drop(blob);
//! assert!(deleted.load(Ordering::SeqCst));
//! ```

mod handle;
mod header;
mod observer;

pub use handle::Ref;
pub use header::{LifeState, ObjectHeader};
pub use observer::{Event, ObserverId};

pub(crate) use handle::{release_erased, ErasedObject, Inner};

use crate::gc::GarbageCollector;

/// Base trait for everything that can live behind a [`Ref`].
///
/// The defaults describe a plain object that never forms reference cycles.
pub trait Object: Send + Sync + 'static {
    /// Short type name used in diagnostics.
    fn class_name(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base)
    }

    /// Whether this object participates in cycle collection.
    fn uses_garbage_collector(&self) -> bool {
        false
    }

    /// Report every strong reference this object holds to other participants.
    ///
    /// Called by the collector while it searches for garbage cycles. Each
    /// outgoing [`Ref`] should be passed to [`GarbageCollector::report`] once.
    fn report_references(&self, _collector: &mut GarbageCollector) {}

    /// Drop every strong reference reported by [`Object::report_references`].
    ///
    /// The collector calls this on each member of a garbage cycle before any
    /// delete observer runs, so no observer sees a half-torn-down peer.
    fn remove_references(&self) {}
}
