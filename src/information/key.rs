//! Typed keys.

use std::fmt;
use std::marker::PhantomData;

use super::value::KeyValue;
use super::Information;

/// Identity of a key: the location (owning module or class) and its name.
///
/// Ordered by location, then name, so printed containers are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId {
    /// Owning location, e.g. `"StreamingPipeline"`.
    pub location: &'static str,
    /// Key name, e.g. `"UPDATE_EXTENT"`.
    pub name: &'static str,
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.location, self.name)
    }
}

/// A key whose value type is fixed at definition time.
///
/// Keys are plain constants; two keys with the same location and name address
/// the same entry.
///
/// ```
/// use trueno_flow::information::{Information, Key};
///
/// static COUNT: Key<i32> = Key::new("COUNT", "Demo");
///
/// let mut info = Information::new();
/// assert!(!COUNT.has(&info));
/// assert_eq!(COUNT.get(&info), 0);
/// COUNT.set(&mut info, 7);
/// assert_eq!(COUNT.get(&info), 7);
/// ```
pub struct Key<V> {
    id: KeyId,
    _value: PhantomData<fn() -> V>,
}

impl<V> Key<V> {
    /// Define a key.
    #[must_use]
    pub const fn new(name: &'static str, location: &'static str) -> Self {
        Self { id: KeyId { location, name }, _value: PhantomData }
    }

    /// The key's identity.
    #[must_use]
    pub const fn id(&self) -> KeyId {
        self.id
    }

    /// The key's name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.id.name
    }

    /// The key's location.
    #[must_use]
    pub const fn location(&self) -> &'static str {
        self.id.location
    }
}

impl<V: KeyValue> Key<V> {
    /// Store `value` in `info`. Returns true if anything changed.
    pub fn set(&self, info: &mut Information, value: V) -> bool {
        info.set(self, value)
    }

    /// Read the stored value, or the type's default when absent.
    #[must_use]
    pub fn get(&self, info: &Information) -> V {
        info.get(self)
    }

    /// Read the stored value if present.
    #[must_use]
    pub fn get_opt(&self, info: &Information) -> Option<V> {
        info.get_opt(self)
    }

    /// Returns true if `info` holds this key.
    #[must_use]
    pub fn has(&self, info: &Information) -> bool {
        info.has(self)
    }

    /// Remove this key from `info`. Returns true if it was present.
    pub fn remove(&self, info: &mut Information) -> bool {
        info.remove(self)
    }

    /// Copy this key's entry from `from` into `to`; absent in `from` removes
    /// it from `to`.
    pub fn shallow_copy(&self, from: &Information, to: &mut Information) {
        to.copy_entry(from, self);
    }
}

impl<V> Clone for Key<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for Key<V> {}

impl<V> fmt::Debug for Key<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.id)
    }
}
