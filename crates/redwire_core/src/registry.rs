//! Per-kind registries
//!
//! A registry is the script-side point of truth for which handles exist
//! and which behavior object backs each one. It is `Open` until the host
//! reaches its registration point and `Frozen` forever after.
//!
//! Registration is a two-phase commit:
//! 1. `register` (any thread) allocates the handle, publishes the object for
//!    lookup and queues a request for the host.
//! 2. The drain step (host thread only) creates the host-side type and
//!    publishes the resulting host id onto the same entry.

use crate::{
    BridgeError, EventOutcome, Handle, HandleAllocator, HandleSlot, HostId, Identifier, Kind,
    KindEvent, KindSettings, ManifestWriter, RegistrationQueue, RegistrationRequest,
};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// A script-side object that can be declared as a new host kind.
pub trait Registrable: Send + Sync + 'static {
    const KIND: Kind;

    /// Events the host can deliver to objects of this kind.
    type Event: KindEvent;

    /// The `namespace:path` string the object was declared with.
    fn identifier(&self) -> &str;

    fn handle_slot(&self) -> &HandleSlot;

    /// Settings snapshot sent to the host.
    fn kind_settings(&self) -> KindSettings;

    /// Run the handler for `event` and produce the host-facing result.
    fn deliver(&self, event: &Self::Event) -> EventOutcome;
}

/// Host-side outcome of a drained request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostBinding {
    Bound(HostId),
    Failed(String),
}

struct Entry<T> {
    object: Arc<T>,
    id: Identifier,
    binding: OnceLock<HostBinding>,
}

pub struct Registry<T: Registrable> {
    allocator: Arc<HandleAllocator>,
    queue: Arc<RegistrationQueue>,
    entries: DashMap<Handle, Entry<T>>,
    by_id: DashMap<Identifier, Handle>,
    // Serializes register against freeze; dispatch never touches it.
    lifecycle: Mutex<()>,
    frozen: AtomicBool,
    manifest: OnceLock<Arc<ManifestWriter>>,
}

impl<T: Registrable> Registry<T> {
    pub fn new() -> Self {
        Self::with_parts(
            Arc::new(HandleAllocator::new()),
            Arc::new(RegistrationQueue::new()),
        )
    }

    /// Build a registry over an existing allocator and queue.
    pub(crate) fn with_parts(allocator: Arc<HandleAllocator>, queue: Arc<RegistrationQueue>) -> Self {
        Self {
            allocator,
            queue,
            entries: DashMap::new(),
            by_id: DashMap::new(),
            lifecycle: Mutex::new(()),
            frozen: AtomicBool::new(false),
            manifest: OnceLock::new(),
        }
    }

    /// Attach the manifest sink. Returns `false` if one was already attached.
    pub fn attach_manifest(&self, writer: Arc<ManifestWriter>) -> bool {
        self.manifest.set(writer).is_ok()
    }

    pub fn kind(&self) -> Kind {
        T::KIND
    }

    /// Declare `object` as a new kind.
    ///
    /// On success the handle is assigned onto the object and is valid for
    /// event dispatch immediately, before the host has created anything.
    pub fn register(&self, object: Arc<T>) -> Result<Handle, BridgeError> {
        let raw_id = object.identifier();
        let (handle, id, settings) = {
            let _guard = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);

            if self.frozen.load(Ordering::Acquire) {
                return Err(BridgeError::AlreadyFrozen {
                    kind: T::KIND,
                    id: raw_id.to_string(),
                });
            }
            if let Some(existing) = object.handle_slot().get() {
                return Err(BridgeError::AlreadyRegistered {
                    id: raw_id.to_string(),
                    handle: existing,
                });
            }
            let id = Identifier::parse(raw_id)?;
            if let Some(existing) = self.by_id.get(&id) {
                return Err(BridgeError::AlreadyRegistered {
                    id: raw_id.to_string(),
                    handle: *existing,
                });
            }

            let handle = self.allocator.allocate();
            let settings = object.kind_settings();

            // Publish for lookup before the request becomes drainable so the
            // drain step always finds the entry it binds.
            self.entries.insert(
                handle,
                Entry {
                    object: Arc::clone(&object),
                    id: id.clone(),
                    binding: OnceLock::new(),
                },
            );
            self.by_id.insert(id.clone(), handle);
            if let Err(existing) = object.handle_slot().assign(handle) {
                // Only reachable if the slot is shared outside any registry.
                self.entries.remove(&handle);
                self.by_id.remove(&id);
                return Err(BridgeError::AlreadyRegistered {
                    id: raw_id.to_string(),
                    handle: existing,
                });
            }
            self.queue.enqueue(RegistrationRequest::new(
                handle,
                id.clone(),
                settings.clone(),
            ));
            (handle, id, settings)
        };

        tracing::debug!(kind = %T::KIND, %handle, %id, "queued registration");

        if let Some(manifest) = self.manifest.get() {
            if let Err(err) = manifest.record(&id, &settings) {
                tracing::warn!(kind = %T::KIND, %id, error = %err, "failed to update manifest");
            }
        }

        Ok(handle)
    }

    /// Refuse further registrations. Idempotent and irreversible.
    pub fn freeze(&self) {
        let _guard = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.frozen.swap(true, Ordering::AcqRel) {
            tracing::info!(kind = %T::KIND, registered = self.entries.len(), "registry frozen");
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Resolve a handle to its behavior object. Never blocks on registration.
    pub fn lookup(&self, handle: Handle) -> Option<Arc<T>> {
        self.entries.get(&handle).map(|entry| Arc::clone(&entry.object))
    }

    pub fn lookup_raw(&self, raw: u64) -> Option<Arc<T>> {
        Handle::from_raw(raw).and_then(|handle| self.lookup(handle))
    }

    /// Handle registered under `id`, if any.
    pub fn handle_of(&self, id: &Identifier) -> Option<Handle> {
        self.by_id.get(id).map(|handle| *handle)
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of every registered handle, in ascending order.
    pub fn handles(&self) -> Vec<Handle> {
        let mut handles: Vec<Handle> = self.entries.iter().map(|entry| *entry.key()).collect();
        handles.sort_unstable();
        handles
    }

    /// Draining goes through [`drain_and_apply`](crate::drain_and_apply) only.
    pub(crate) fn queue(&self) -> &Arc<RegistrationQueue> {
        &self.queue
    }

    /// Host binding of `handle`, or `None` while it is still pending.
    pub fn binding(&self, handle: Handle) -> Option<HostBinding> {
        self.entries
            .get(&handle)
            .and_then(|entry| entry.binding.get().cloned())
    }

    /// Host-native id of `handle`. Fails while pending or after a host failure.
    pub fn host_id(&self, handle: Handle) -> Result<HostId, BridgeError> {
        let entry = self.entries.get(&handle).ok_or(BridgeError::UnknownHandle {
            kind: T::KIND,
            handle,
        })?;
        match entry.binding.get() {
            Some(HostBinding::Bound(host_id)) => Ok(*host_id),
            Some(HostBinding::Failed(reason)) => Err(BridgeError::HostRegistrationFailed {
                kind: T::KIND,
                handle,
                reason: reason.clone(),
            }),
            None => Err(BridgeError::HostBindingPending {
                kind: T::KIND,
                handle,
            }),
        }
    }

    /// Phase two: record the host outcome for `handle`. Each handle binds once.
    pub(crate) fn publish_binding(&self, handle: Handle, binding: HostBinding) -> bool {
        match self.entries.get(&handle) {
            Some(entry) => entry.binding.set(binding).is_ok(),
            None => false,
        }
    }
}

impl<T: Registrable> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BlockType;
    use std::thread;

    fn ore(id: &str) -> Arc<BlockType> {
        BlockType::builder(id).hardness(3.0).requires_tool(true).build()
    }

    #[test]
    fn register_then_lookup_then_freeze() {
        let registry = Registry::<BlockType>::new();
        let ruby = ore("mymod:ruby_ore");

        let handle = registry.register(Arc::clone(&ruby)).unwrap();
        assert_ne!(handle.raw(), 0);
        assert!(Arc::ptr_eq(&registry.lookup(handle).unwrap(), &ruby));
        assert_eq!(ruby.handle(), Some(handle));

        registry.freeze();
        let err = registry.register(ore("mymod:another_ore")).unwrap_err();
        assert!(matches!(err, BridgeError::AlreadyFrozen { kind: Kind::Block, .. }));
        assert_eq!(registry.handles(), vec![handle]);
    }

    #[test]
    fn double_registration_keeps_first_handle() {
        let registry = Registry::<BlockType>::new();
        let ruby = ore("mymod:ruby_ore");
        let first = registry.register(Arc::clone(&ruby)).unwrap();

        let err = registry.register(Arc::clone(&ruby)).unwrap_err();
        assert_eq!(
            err,
            BridgeError::AlreadyRegistered {
                id: "mymod:ruby_ore".into(),
                handle: first
            }
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.queue().len(), 1);
    }

    #[test]
    fn duplicate_identifier_is_rejected() {
        let registry = Registry::<BlockType>::new();
        let first = registry.register(ore("mymod:ruby_ore")).unwrap();
        let err = registry.register(ore("mymod:ruby_ore")).unwrap_err();
        assert!(matches!(err, BridgeError::AlreadyRegistered { handle, .. } if handle == first));
    }

    #[test]
    fn invalid_identifier_allocates_nothing() {
        let registry = Registry::<BlockType>::new();
        let bad = ore("Ruby Ore");
        let err = registry.register(Arc::clone(&bad)).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidIdentifier { .. }));
        assert!(registry.is_empty());
        assert!(registry.queue().is_empty());
        assert_eq!(bad.handle(), None);
    }

    #[test]
    fn freeze_is_idempotent() {
        let registry = Registry::<BlockType>::new();
        registry.freeze();
        registry.freeze();
        assert!(registry.is_frozen());
    }

    #[test]
    fn lookup_of_unknown_handle_is_absent() {
        let registry = Registry::<BlockType>::new();
        assert!(registry.lookup_raw(0).is_none());
        assert!(registry.lookup_raw(42).is_none());
    }

    #[test]
    fn binding_transitions_from_pending() {
        let registry = Registry::<BlockType>::new();
        let handle = registry.register(ore("mymod:ruby_ore")).unwrap();

        assert!(matches!(
            registry.host_id(handle),
            Err(BridgeError::HostBindingPending { .. })
        ));
        assert!(registry.publish_binding(handle, HostBinding::Bound(HostId(900))));
        assert!(!registry.publish_binding(handle, HostBinding::Failed("again".into())));
        assert_eq!(registry.host_id(handle), Ok(HostId(900)));
    }

    #[test]
    fn concurrent_registration_and_freeze_leave_consistent_state() {
        let registry = Registry::<BlockType>::new();

        thread::scope(|s| {
            for t in 0..4 {
                let registry = &registry;
                s.spawn(move || {
                    for i in 0..50 {
                        let _ = registry.register(ore(&format!("mymod:ore_{t}_{i}")));
                    }
                });
            }
            s.spawn(|| registry.freeze());
        });

        // Everything registered before the freeze was queued exactly once.
        assert_eq!(registry.queue().drain_all().len(), registry.len());
        assert!(registry.register(ore("mymod:late")).is_err());
    }
}
