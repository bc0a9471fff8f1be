//! Per-object bookkeeping shared by every [`Ref`](super::Ref) to the object.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Weak;

use parking_lot::Mutex;
use tracing::trace;

use super::handle::Inner;
use super::observer::{Callback, Event, ObserverId, ObserverList};
use super::Object;
use crate::timestamp::TimeStamp;

/// Where an object is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeState {
    /// Reachable and usable.
    Alive,
    /// Selected as garbage by the collector; its references are being removed.
    Doomed,
    /// Destroyed. Delete observers have run.
    Destroyed,
}

impl LifeState {
    const fn to_u8(self) -> u8 {
        match self {
            LifeState::Alive => 0,
            LifeState::Doomed => 1,
            LifeState::Destroyed => 2,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LifeState::Alive,
            1 => LifeState::Doomed,
            _ => LifeState::Destroyed,
        }
    }
}

/// Reference count, modification time and observers of one object.
pub struct ObjectHeader {
    count: AtomicUsize,
    state: AtomicU8,
    mtime: TimeStamp,
    observers: Mutex<ObserverList>,
    /// Type-erased self pointer, used to hand the object to the collector.
    erased: Weak<Inner<dyn Object>>,
    /// Self pointer used for downcasting erased handles.
    any: Weak<dyn Any + Send + Sync>,
}

impl ObjectHeader {
    pub(crate) fn new(erased: Weak<Inner<dyn Object>>, any: Weak<dyn Any + Send + Sync>) -> Self {
        Self {
            count: AtomicUsize::new(1),
            state: AtomicU8::new(LifeState::Alive.to_u8()),
            mtime: TimeStamp::modified_now(),
            observers: Mutex::new(ObserverList::default()),
            erased,
            any,
        }
    }

    /// Number of strong owners.
    #[must_use]
    pub fn reference_count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Current lifetime state.
    #[must_use]
    pub fn life_state(&self) -> LifeState {
        LifeState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns true until the collector dooms or destroys the object.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.life_state() == LifeState::Alive
    }

    /// Modification time.
    #[must_use]
    pub fn mtime(&self) -> u64 {
        self.mtime.get()
    }

    /// Advance the modification time and notify `Modified` observers.
    pub fn modified(&self) {
        self.mtime.modified();
        let mut callbacks = self.observers.lock().take(Event::Modified);
        if callbacks.is_empty() {
            return;
        }
        for (_, callback) in &mut callbacks {
            callback(Event::Modified);
        }
        self.observers.lock().restore(Event::Modified, callbacks);
    }

    pub(crate) fn add_observer(&self, event: Event, callback: Callback) -> ObserverId {
        self.observers.lock().add(event, callback)
    }

    pub(crate) fn remove_observer(&self, id: ObserverId) -> bool {
        self.observers.lock().remove(id)
    }

    pub(crate) fn erased(&self) -> Option<std::sync::Arc<Inner<dyn Object>>> {
        self.erased.upgrade()
    }

    pub(crate) fn any(&self) -> Option<std::sync::Arc<dyn Any + Send + Sync>> {
        self.any.upgrade()
    }

    /// Register: count += 1.
    pub(crate) fn register(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    /// Unregister: count -= 1. Returns true if this released the last owner.
    pub(crate) fn unregister(&self) -> bool {
        let previous = self.count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "reference count went negative");
        if previous == 0 {
            // Undo so the count stays at its floor in release builds.
            self.count.fetch_add(1, Ordering::AcqRel);
            return false;
        }
        previous == 1
    }

    pub(crate) fn set_doomed(&self) {
        let _ = self.state.compare_exchange(
            LifeState::Alive.to_u8(),
            LifeState::Doomed.to_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Destroy the object: zero the count, mark it destroyed and fire the
    /// `Delete` observers. Must happen exactly once.
    pub(crate) fn destroy(&self, class_name: &str) {
        self.count.store(0, Ordering::Release);
        let previous = self.state.swap(LifeState::Destroyed.to_u8(), Ordering::AcqRel);
        if LifeState::from_u8(previous) == LifeState::Destroyed {
            debug_assert!(false, "{class_name} destroyed twice");
            return;
        }
        trace!(class = class_name, "object.destroy");
        let callbacks = self.observers.lock().take(Event::Delete);
        for (_, mut callback) in callbacks {
            callback(Event::Delete);
        }
    }
}

impl fmt::Debug for ObjectHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHeader")
            .field("count", &self.reference_count())
            .field("state", &self.life_state())
            .field("mtime", &self.mtime())
            .finish()
    }
}
