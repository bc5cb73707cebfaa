// Arena — Per-device registry of live allocations
//
// Every allocation a backend hands out is recorded here under a fresh
// `AllocId`. Tensors never hold raw device pointers directly: they hold the
// id plus a byte offset, and resolve the base pointer through the arena on
// each access.
//
// This makes the single-owner rule observable:
//
//   - releasing an id twice fails with `DoubleRelease` instead of freeing
//     memory twice
//   - resolving an id whose owner is gone fails with `DanglingHandle`
//     instead of reading freed memory
//   - `stats()` counts allocations and releases, so tests can check that an
//     owner plus any number of views releases exactly once
//
// Ids are never reused, so a stale view can not accidentally alias a newer
// allocation that happened to land at the same address.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};

/// Identifier of one allocation inside an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocId(u64);

impl AllocId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AllocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A live allocation: base pointer and its capacity in bytes.
#[derive(Debug, Clone, Copy)]
pub struct Slot<P> {
    pub ptr: P,
    pub bytes: usize,
}

/// Snapshot of an arena's bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Allocations currently live.
    pub live_allocations: usize,
    /// Bytes currently live.
    pub live_bytes: usize,
    /// Cumulative allocations recorded.
    pub allocations: u64,
    /// Cumulative releases recorded.
    pub releases: u64,
    /// Highest `live_bytes` ever observed.
    pub peak_bytes: usize,
}

/// Registry of live allocations for one device.
pub struct Arena<P> {
    slots: Mutex<HashMap<u64, Slot<P>>>,
    next_id: AtomicU64,
    allocations: AtomicU64,
    releases: AtomicU64,
    live_bytes: AtomicUsize,
    peak_bytes: AtomicUsize,
}

impl<P: Copy> Arena<P> {
    pub fn new() -> Self {
        Arena {
            slots: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            allocations: AtomicU64::new(0),
            releases: AtomicU64::new(0),
            live_bytes: AtomicUsize::new(0),
            peak_bytes: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<u64, Slot<P>>>> {
        self.slots
            .lock()
            .map_err(|_| Error::msg("arena lock poisoned"))
    }

    /// Record a fresh allocation.
    pub fn insert(&self, ptr: P, bytes: usize) -> Result<AllocId> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut slots = self.lock()?;
        slots.insert(id, Slot { ptr, bytes });
        // counters move under the slot lock, so live/peak stay consistent
        let live = self.live_bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.peak_bytes.fetch_max(live, Ordering::Relaxed);
        self.allocations.fetch_add(1, Ordering::Relaxed);
        Ok(AllocId(id))
    }

    /// Look up a live allocation.
    pub fn resolve(&self, id: AllocId) -> Result<Slot<P>> {
        self.lock()?
            .get(&id.0)
            .copied()
            .ok_or(Error::DanglingHandle { id: id.0 })
    }

    /// Remove an allocation, returning it so the backend can free it.
    pub fn remove(&self, id: AllocId) -> Result<Slot<P>> {
        let mut slots = self.lock()?;
        let slot = slots
            .remove(&id.0)
            .ok_or(Error::DoubleRelease { id: id.0 })?;
        self.live_bytes.fetch_sub(slot.bytes, Ordering::Relaxed);
        self.releases.fetch_add(1, Ordering::Relaxed);
        Ok(slot)
    }

    /// Whether an allocation is still live.
    pub fn contains(&self, id: AllocId) -> bool {
        self.lock().map(|s| s.contains_key(&id.0)).unwrap_or(false)
    }

    pub fn stats(&self) -> ArenaStats {
        let live_allocations = self.lock().map(|s| s.len()).unwrap_or(0);
        ArenaStats {
            live_allocations,
            live_bytes: self.live_bytes.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            peak_bytes: self.peak_bytes.load(Ordering::Relaxed),
        }
    }
}

impl<P: Copy> Default for Arena<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for Arena<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("allocations", &self.allocations.load(Ordering::Relaxed))
            .field("releases", &self.releases.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_resolve_remove() {
        let arena: Arena<usize> = Arena::new();
        let id = arena.insert(0x1000, 64).unwrap();
        assert_eq!(arena.resolve(id).unwrap().ptr, 0x1000);
        assert_eq!(arena.stats().live_bytes, 64);

        let slot = arena.remove(id).unwrap();
        assert_eq!(slot.bytes, 64);
        assert!(!arena.contains(id));
        assert!(matches!(arena.resolve(id), Err(Error::DanglingHandle { .. })));
    }

    #[test]
    fn test_double_release_detected() {
        let arena: Arena<usize> = Arena::new();
        let id = arena.insert(8, 8).unwrap();
        arena.remove(id).unwrap();
        assert!(matches!(arena.remove(id), Err(Error::DoubleRelease { .. })));
        let stats = arena.stats();
        assert_eq!((stats.allocations, stats.releases), (1, 1));
    }

    #[test]
    fn test_ids_not_reused() {
        let arena: Arena<usize> = Arena::new();
        let a = arena.insert(16, 4).unwrap();
        arena.remove(a).unwrap();
        let b = arena.insert(16, 4).unwrap();
        assert_ne!(a, b);
        assert!(arena.resolve(a).is_err());
    }

    #[test]
    fn test_peak_bytes() {
        let arena: Arena<usize> = Arena::new();
        let a = arena.insert(1, 100).unwrap();
        let b = arena.insert(2, 50).unwrap();
        arena.remove(a).unwrap();
        arena.remove(b).unwrap();
        let stats = arena.stats();
        assert_eq!(stats.peak_bytes, 150);
        assert_eq!(stats.live_bytes, 0);
    }

    #[test]
    fn test_live_bytes_tracks_inserts_and_removes() {
        let arena: Arena<usize> = Arena::new();
        let a = arena.insert(1, 100).unwrap();
        arena.remove(a).unwrap();
        let b = arena.insert(2, 30).unwrap();
        let c = arena.insert(3, 40).unwrap();
        assert_eq!(arena.stats().live_bytes, 70);
        assert_eq!(arena.stats().peak_bytes, 100);

        arena.remove(b).unwrap();
        assert!(arena.remove(b).is_err());
        assert_eq!(arena.stats().live_bytes, 40);
        let d = arena.insert(4, 90).unwrap();
        let stats = arena.stats();
        assert_eq!(stats.live_bytes, 130);
        assert_eq!(stats.peak_bytes, 130);
        assert_eq!(stats.live_allocations, 2);
        arena.remove(c).unwrap();
        arena.remove(d).unwrap();
        assert_eq!(arena.stats().live_bytes, 0);
    }
}
