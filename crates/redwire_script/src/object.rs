//! Host objects pinned on behalf of scripts
//!
//! Scripts never hold host objects directly. They hold an [`ObjectRef`]
//! and the table keeps the object alive until the ref is released.

use crate::ObjectRef;
use dashmap::DashMap;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub struct ObjectTable<T> {
    next: AtomicU64,
    objects: DashMap<ObjectRef, T>,
}

impl<T> ObjectTable<T> {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            objects: DashMap::new(),
        }
    }

    /// Pin `object` and return a fresh reference to it. Refs are never reused.
    pub fn store(&self, object: T) -> ObjectRef {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        let Some(raw) = NonZeroU64::new(raw) else {
            unreachable!("object refs start at 1 and are never zero");
        };
        let object_ref = ObjectRef::from(raw);
        self.objects.insert(object_ref, object);
        object_ref
    }

    pub fn get(&self, object: ObjectRef) -> Option<T>
    where
        T: Clone,
    {
        self.objects.get(&object).map(|entry| entry.value().clone())
    }

    /// Run `f` against the pinned object without cloning it.
    pub fn with<R>(&self, object: ObjectRef, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.objects.get(&object).map(|entry| f(entry.value()))
    }

    pub fn with_mut<R>(&self, object: ObjectRef, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.objects.get_mut(&object).map(|mut entry| f(entry.value_mut()))
    }

    pub fn contains(&self, object: ObjectRef) -> bool {
        self.objects.contains_key(&object)
    }

    pub fn release(&self, object: ObjectRef) -> Option<T> {
        self.objects.remove(&object).map(|(_, value)| value)
    }

    /// Unpin everything, e.g. when the script runtime shuts down.
    pub fn release_all(&self) -> usize {
        let released = self.objects.len();
        self.objects.clear();
        released
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl<T> Default for ObjectTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_get_release() {
        let table = ObjectTable::new();
        let a = table.store("world".to_string());
        let b = table.store("player".to_string());
        assert_ne!(a, b);
        assert_ne!(a.raw(), 0);
        assert_eq!(table.get(a).as_deref(), Some("world"));

        assert_eq!(table.release(a).as_deref(), Some("world"));
        assert!(table.get(a).is_none());
        assert!(table.release(a).is_none());

        let c = table.store("again".to_string());
        assert_ne!(c, a);
        assert_eq!(table.release_all(), 2);
        assert!(table.is_empty() && !table.contains(b));
    }

    #[test]
    fn with_mut_updates_in_place() {
        let table = ObjectTable::new();
        let counter = table.store(0_u32);
        table.with_mut(counter, |n| *n += 5);
        assert_eq!(table.with(counter, |n| *n), Some(5));
    }
}
