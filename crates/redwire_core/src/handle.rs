//! Opaque handles shared across the bridge boundary
//!
//! A handle names one registered object kind for the lifetime of the
//! process. Value `0` is reserved on the wire to mean "allocation or
//! registration failed" and is never issued.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

/// Handle assigned to each registered block, item or entity kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(NonZeroU64);

impl Handle {
    /// Raw value reserved for "no handle" when crossing into the host.
    pub const INVALID_RAW: u64 = 0;

    /// Rebuild a handle from its raw wire value. Returns `None` for `0`.
    #[inline]
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Return the raw value backing this handle.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0.get()
    }

    /// Wire representation used by hosts with signed 64-bit ids.
    #[inline]
    pub fn to_wire(self) -> i64 {
        self.0.get() as i64
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issues monotonically increasing handles from a single atomic counter.
///
/// Safe to call from any thread. A value is never returned twice; the
/// counter refuses to wrap back to the reserved zero value.
#[derive(Debug)]
pub struct HandleAllocator {
    next: AtomicU64,
}

impl HandleAllocator {
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next handle.
    ///
    /// # Panics
    /// Panics if the 64-bit handle space is exhausted.
    pub fn allocate(&self) -> Handle {
        let raw = self
            .next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1))
            .unwrap_or_else(|_| panic!("handle space exhausted"));
        // The counter starts at 1 and never wraps, so raw is never zero.
        match NonZeroU64::new(raw) {
            Some(n) => Handle(n),
            None => unreachable!("handle allocator issued zero"),
        }
    }

    /// Number of handles issued so far.
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed) - 1
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Write-once slot carried by a behavior object to remember its handle.
#[derive(Debug, Default)]
pub struct HandleSlot(OnceLock<Handle>);

impl HandleSlot {
    pub const fn new() -> Self {
        Self(OnceLock::new())
    }

    pub fn get(&self) -> Option<Handle> {
        self.0.get().copied()
    }

    /// Assign the handle. Returns the handle already stored on conflict.
    pub(crate) fn assign(&self, handle: Handle) -> Result<(), Handle> {
        self.0.set(handle).map_err(|_| self.get().unwrap_or(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn allocation_starts_above_zero() {
        let alloc = HandleAllocator::new();
        let first = alloc.allocate();
        assert_eq!(first.raw(), 1);
        assert_ne!(first.raw(), Handle::INVALID_RAW);
        assert_eq!(alloc.allocate().raw(), 2);
        assert_eq!(alloc.issued(), 2);
    }

    #[test]
    fn handles_are_unique_under_contention() {
        let alloc = HandleAllocator::new();
        let per_thread = 2_000;
        let threads = 8;

        let all: Vec<Handle> = thread::scope(|s| {
            let workers: Vec<_> = (0..threads)
                .map(|_| s.spawn(|| (0..per_thread).map(|_| alloc.allocate()).collect::<Vec<_>>()))
                .collect();
            workers
                .into_iter()
                .flat_map(|w| w.join().expect("allocator thread panicked"))
                .collect()
        });

        let unique: HashSet<_> = all.iter().copied().collect();
        assert_eq!(unique.len(), threads * per_thread);
        assert!(all.iter().all(|h| h.raw() != 0));
    }

    #[test]
    fn raw_zero_is_not_a_handle() {
        assert!(Handle::from_raw(0).is_none());
        assert_eq!(Handle::from_raw(7).map(Handle::raw), Some(7));
    }

    #[test]
    fn slot_assigns_once() {
        let alloc = HandleAllocator::new();
        let slot = HandleSlot::new();
        let h1 = alloc.allocate();
        let h2 = alloc.allocate();
        assert!(slot.assign(h1).is_ok());
        assert_eq!(slot.assign(h2), Err(h1));
        assert_eq!(slot.get(), Some(h1));
    }
}
