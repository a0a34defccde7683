//! Pending registration requests
//!
//! Producers on any thread push requests; the host's privileged thread
//! drains the whole batch at its registration point.

use crate::{Handle, Identifier, Kind, KindSettings};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Immutable description of one kind waiting for host-side creation.
#[derive(Clone, Debug, PartialEq)]
pub struct RegistrationRequest {
    handle: Handle,
    id: Identifier,
    settings: KindSettings,
}

impl RegistrationRequest {
    pub fn new(handle: Handle, id: Identifier, settings: KindSettings) -> Self {
        Self {
            handle,
            id,
            settings,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    pub fn namespace(&self) -> &str {
        self.id.namespace()
    }

    pub fn path(&self) -> &str {
        self.id.path()
    }

    pub fn kind(&self) -> Kind {
        self.settings.kind()
    }

    pub fn settings(&self) -> &KindSettings {
        &self.settings
    }
}

/// Multiple-producer, single-consumer queue of registration requests.
///
/// Enqueue holds the lock only for a push. Draining swaps the whole buffer
/// out under the same lock, so a concurrent enqueue lands either in this
/// batch or the next one, never both and never neither.
#[derive(Debug, Default)]
pub struct RegistrationQueue {
    pending: Mutex<VecDeque<RegistrationRequest>>,
}

impl RegistrationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, request: RegistrationRequest) {
        self.lock().push_back(request);
    }

    /// Take every request enqueued so far, in enqueue order.
    ///
    /// This is the unguarded primitive. The queues owned by a
    /// [`Registry`](crate::Registry) are only drained through
    /// [`drain_and_apply`](crate::drain_and_apply), which enforces the host
    /// thread.
    pub fn drain_all(&self) -> Vec<RegistrationRequest> {
        let batch = std::mem::take(&mut *self.lock());
        batch.into()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<RegistrationRequest>> {
        // A push or swap never leaves the deque half-updated.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
