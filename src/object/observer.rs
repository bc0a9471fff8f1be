//! Event observers attached to objects.

use std::fmt;

/// Events an object can emit to its observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// The object is being destroyed. Fires exactly once.
    Delete,
    /// The object's modification time advanced.
    Modified,
}

/// Handle identifying a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

pub(crate) type Callback = Box<dyn FnMut(Event) + Send>;

struct Entry {
    id: ObserverId,
    event: Event,
    callback: Callback,
}

/// Observers registered on one object.
#[derive(Default)]
pub(crate) struct ObserverList {
    next_id: u64,
    entries: Vec<Entry>,
}

impl ObserverList {
    pub(crate) fn add(&mut self, event: Event, callback: Callback) -> ObserverId {
        self.next_id += 1;
        let id = ObserverId(self.next_id);
        self.entries.push(Entry { id, event, callback });
        id
    }

    pub(crate) fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Move out the observers for `event`, leaving the others in place.
    pub(crate) fn take(&mut self, event: Event) -> Vec<(ObserverId, Callback)> {
        let (taken, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.entries).into_iter().partition(|e| e.event == event);
        self.entries = kept;
        taken.into_iter().map(|e| (e.id, e.callback)).collect()
    }

    /// Put back observers removed with [`ObserverList::take`], ahead of any
    /// registered while they were out.
    pub(crate) fn restore(&mut self, event: Event, callbacks: Vec<(ObserverId, Callback)>) {
        let mut restored: Vec<Entry> =
            callbacks.into_iter().map(|(id, callback)| Entry { id, event, callback }).collect();
        restored.append(&mut self.entries);
        self.entries = restored;
    }
}

impl fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList").field("observers", &self.entries.len()).finish()
    }
}
