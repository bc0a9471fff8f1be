//! The counted handle type.

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};

use super::header::ObjectHeader;
use super::observer::{Event, ObserverId};
use super::Object;
use crate::gc;

/// Heap cell holding an object and its header.
pub(crate) struct Inner<T: ?Sized> {
    pub(crate) header: ObjectHeader,
    pub(crate) value: T,
}

/// A type-erased strong pointer, as handled by the collector.
pub(crate) type ErasedObject = Arc<Inner<dyn Object>>;

/// Strong, counted handle to an [`Object`].
///
/// `Clone` registers a new owner and `Drop` unregisters one. The last
/// unregister destroys the object, unless it participates in cycle collection
/// and the collector decides otherwise (see [`crate::gc`]).
pub struct Ref<T: Object + ?Sized> {
    inner: Arc<Inner<T>>,
}

impl<T: Object> Ref<T> {
    /// Create a new object owned by the returned handle (count = 1).
    pub fn new(value: T) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<Inner<T>>| {
            let erased: Weak<Inner<dyn Object>> = weak.clone();
            let any: Weak<dyn std::any::Any + Send + Sync> = weak.clone();
            Inner { header: ObjectHeader::new(erased, any), value }
        });
        Self { inner }
    }

    /// Erase the concrete type, registering a new owner.
    #[must_use]
    pub fn to_object(&self) -> Ref<dyn Object> {
        self.inner.header.register();
        let inner: Arc<Inner<dyn Object>> = self.inner.clone();
        Ref { inner }
    }
}

impl Ref<dyn Object> {
    /// Recover the concrete type, registering a new owner on success.
    #[must_use]
    pub fn downcast<T: Object>(&self) -> Option<Ref<T>> {
        let any = self.inner.header.any()?;
        let inner = any.downcast::<Inner<T>>().ok()?;
        inner.header.register();
        Some(Ref { inner })
    }

    /// Returns true if the erased object is a `T`.
    #[must_use]
    pub fn is<T: Object>(&self) -> bool {
        self.inner.header.any().is_some_and(|any| any.is::<Inner<T>>())
    }
}

impl<T: Object + ?Sized> Ref<T> {
    /// The object's header (count, state, modification time).
    #[must_use]
    pub fn header(&self) -> &ObjectHeader {
        &self.inner.header
    }

    /// Number of strong owners.
    #[must_use]
    pub fn reference_count(&self) -> usize {
        self.inner.header.reference_count()
    }

    /// Modification time of the object.
    #[must_use]
    pub fn mtime(&self) -> u64 {
        self.inner.header.mtime()
    }

    /// Advance the modification time, notifying `Modified` observers.
    pub fn modified(&self) {
        self.inner.header.modified();
    }

    /// Returns true once delete observers have run.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.header.life_state() == super::LifeState::Destroyed
    }

    /// Register a callback for `event`.
    pub fn add_observer<F>(&self, event: Event, callback: F) -> ObserverId
    where
        F: FnMut(Event) + Send + 'static,
    {
        self.inner.header.add_observer(event, Box::new(callback))
    }

    /// Remove a previously registered callback.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.inner.header.remove_observer(id)
    }

    /// Returns true if both handles point at the same object.
    #[must_use]
    pub fn ptr_eq<U: Object + ?Sized>(&self, other: &Ref<U>) -> bool {
        self.addr() == other.addr()
    }

    /// Address of the object, used as its identity.
    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    pub(crate) fn erased(&self) -> Option<ErasedObject> {
        self.inner.header.erased()
    }
}

impl<T: Object + ?Sized> Clone for Ref<T> {
    fn clone(&self) -> Self {
        self.inner.header.register();
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T: Object + ?Sized> Drop for Ref<T> {
    fn drop(&mut self) {
        let inner = &self.inner;
        if inner.value.uses_garbage_collector() {
            if let Some(erased) = inner.header.erased() {
                if gc::give_reference(erased) {
                    return;
                }
            }
        }
        if inner.header.unregister() {
            inner.header.destroy(inner.value.class_name());
        }
    }
}

impl<T: Object + ?Sized> Deref for Ref<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner.value
    }
}

impl<T: Object + ?Sized> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("class", &self.inner.value.class_name())
            .field("address", &format_args!("{:#x}", self.addr()))
            .field("count", &self.reference_count())
            .finish()
    }
}

/// Release one reference the collector was holding on behalf of a dropped
/// handle. Destroys the object if that was the last owner.
pub(crate) fn release_erased(object: &ErasedObject) {
    if object.header.unregister() {
        object.header.destroy(object.value.class_name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter;
    impl Object for Counter {}

    struct Other;
    impl Object for Other {}

    #[test]
    fn test_new_has_single_owner() {
        let r = Ref::new(Counter);
        assert_eq!(r.reference_count(), 1);
    }

    #[test]
    fn test_clone_and_drop_adjust_count() {
        let r = Ref::new(Counter);
        let r2 = r.clone();
        assert_eq!(r.reference_count(), 2);
        drop(r2);
        assert_eq!(r.reference_count(), 1);
    }

    #[test]
    fn test_delete_observer_fires_once_on_last_drop() {
        let fired = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&fired);
        let r = Ref::new(Counter);
        r.add_observer(Event::Delete, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let r2 = r.clone();
        drop(r);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        drop(r2);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_modified_advances_and_notifies() {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let r = Ref::new(Counter);
        let before = r.mtime();
        let id = r.add_observer(Event::Modified, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        r.modified();
        assert!(r.mtime() > before);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(r.remove_observer(id));
        r.modified();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_erase_and_downcast() {
        let r = Ref::new(Counter);
        let erased = r.to_object();
        assert_eq!(r.reference_count(), 2);
        assert!(erased.is::<Counter>());
        assert!(!erased.is::<Other>());

        let back = erased.downcast::<Counter>().unwrap();
        assert!(back.ptr_eq(&r));
        assert_eq!(r.reference_count(), 3);
        assert!(erased.downcast::<Other>().is_none());
        assert_eq!(r.reference_count(), 3);
    }

    #[test]
    fn test_debug_names_class() {
        let r = Ref::new(Counter);
        assert!(format!("{r:?}").contains("Counter"));
    }
}
