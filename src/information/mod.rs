//! Typed, keyed property bags.
//!
//! An [`Information`] maps [`Key`] identities to [`Value`]s and owns every
//! value it stores. Pipeline stages exchange metadata (extents, time steps,
//! array names, the output data object itself) through these containers; the
//! executive reads the per-key stamps to tell what changed.
//!
//! Reading an absent key is never an error: [`Key::get`] returns the value
//! type's default and [`Key::has`] tells the two cases apart.

mod key;
pub mod keys;
mod value;
mod vector;

pub use key::{Key, KeyId};
pub use value::{KeyValue, Value, ValueKind};
pub use vector::InformationVector;

use std::collections::HashMap;
use std::fmt;

use crate::gc::GarbageCollector;
use crate::timestamp::TimeStamp;

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    mtime: u64,
}

/// A keyed container of heterogeneous values.
#[derive(Debug, Clone, Default)]
pub struct Information {
    entries: HashMap<KeyId, Entry>,
    mtime: TimeStamp,
}

impl Information {
    /// Create an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`. Returns true if the container changed.
    ///
    /// Storing a value equal to the current one is a no-op and leaves every
    /// stamp alone. Unset object references remove the entry.
    pub fn set<V: KeyValue>(&mut self, key: &Key<V>, value: V) -> bool {
        match value.into_value() {
            Some(value) => self.store(key.id(), value),
            None => self.remove_id(key.id()),
        }
    }

    /// Read `key`, or the value type's default when absent.
    #[must_use]
    pub fn get<V: KeyValue>(&self, key: &Key<V>) -> V {
        self.get_opt(key).unwrap_or_else(V::default_value)
    }

    /// Read `key` if present.
    #[must_use]
    pub fn get_opt<V: KeyValue>(&self, key: &Key<V>) -> Option<V> {
        let entry = self.entries.get(&key.id())?;
        let value = V::from_value(&entry.value);
        debug_assert!(
            value.is_some(),
            "key {} holds a {:?} value, read as {:?}",
            key.id(),
            entry.value.kind(),
            V::KIND
        );
        value
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn has<V>(&self, key: &Key<V>) -> bool {
        self.entries.contains_key(&key.id())
    }

    /// Remove `key`. Returns true if it was present.
    pub fn remove<V>(&mut self, key: &Key<V>) -> bool {
        self.remove_id(key.id())
    }

    /// Raw access to a stored value.
    #[must_use]
    pub fn value(&self, id: KeyId) -> Option<&Value> {
        self.entries.get(&id).map(|e| &e.value)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.mtime.modified();
        }
    }

    /// Identities of every stored key, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<KeyId> {
        let mut ids: Vec<KeyId> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Copy one entry from `from`. If `from` lacks the key it is removed here.
    ///
    /// Returns true if this container changed.
    pub fn copy_entry<V>(&mut self, from: &Information, key: &Key<V>) -> bool {
        let id = key.id();
        match from.entries.get(&id) {
            Some(entry) => self.store(id, entry.value.clone()),
            None => self.remove_id(id),
        }
    }

    /// Copy every entry of `from` into this container, keeping entries that
    /// `from` does not have.
    pub fn copy_from(&mut self, from: &Information) -> bool {
        let mut changed = false;
        for (&id, entry) in &from.entries {
            changed |= self.store(id, entry.value.clone());
        }
        changed
    }

    /// Stamp of the most recent change to any entry.
    #[must_use]
    pub fn mtime(&self) -> u64 {
        self.mtime.get()
    }

    /// Stamp of the most recent change to `key`, if present.
    #[must_use]
    pub fn key_mtime<V>(&self, key: &Key<V>) -> Option<u64> {
        self.entries.get(&key.id()).map(|e| e.mtime)
    }

    /// Report every stored object reference to `collector`.
    pub fn report_references(&self, collector: &mut GarbageCollector) {
        for id in self.keys() {
            if let Some(Value::Object(object)) = self.value(id) {
                collector.report(object, id.name);
            }
        }
    }

    fn store(&mut self, id: KeyId, value: Value) -> bool {
        if let Some(existing) = self.entries.get_mut(&id) {
            debug_assert_eq!(
                existing.value.kind(),
                value.kind(),
                "key {id} used with two value types"
            );
            if existing.value.same_as(&value) {
                return false;
            }
            existing.value = value;
            existing.mtime = self.mtime.modified();
            return true;
        }
        let mtime = self.mtime.modified();
        self.entries.insert(id, Entry { value, mtime });
        true
    }

    fn remove_id(&mut self, id: KeyId) -> bool {
        if self.entries.remove(&id).is_some() {
            self.mtime.modified();
            true
        } else {
            false
        }
    }
}

impl fmt::Display for Information {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for id in self.keys() {
            if let Some(value) = self.value(id) {
                writeln!(f, "{id}: {value}")?;
            }
        }
        Ok(())
    }
}
