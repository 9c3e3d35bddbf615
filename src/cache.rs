// Thread-safe keyed counters with creation and last-access timestamps
use crate::error::CacheError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// Copy of an entry's scalar fields. Callers never get at the entry itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntrySnapshot {
    pub created: Instant,
    pub accessed: Instant,
    pub count: f64,
}

struct Entry {
    created: Instant,
    // Nanoseconds after `created`; only ever moves forward.
    accessed_ns: AtomicU64,
    // f64 bit pattern.
    count: AtomicU64,
}

impl Entry {
    fn new(now: Instant) -> Self {
        Entry {
            created: now,
            accessed_ns: AtomicU64::new(0),
            count: AtomicU64::new(0f64.to_bits()),
        }
    }

    fn touch(&self, now: Instant) -> Instant {
        let ns = u64::try_from(now.saturating_duration_since(self.created).as_nanos())
            .unwrap_or(u64::MAX);
        let prev = self.accessed_ns.fetch_max(ns, Ordering::AcqRel);
        self.created + Duration::from_nanos(prev.max(ns))
    }

    fn accessed(&self) -> Instant {
        self.created + Duration::from_nanos(self.accessed_ns.load(Ordering::Acquire))
    }

    fn count(&self) -> f64 {
        f64::from_bits(self.count.load(Ordering::Acquire))
    }

    fn add(&self, delta: f64) -> f64 {
        let prev = match self.count.fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
            Some((f64::from_bits(bits) + delta).to_bits())
        }) {
            Ok(bits) | Err(bits) => bits,
        };
        f64::from_bits(prev) + delta
    }

    fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot { created: self.created, accessed: self.accessed(), count: self.count() }
    }
}

/// One reader/writer lock guards the whole map. Lookups and counter updates
/// take the shared side; only inserting or removing a key takes the
/// exclusive side. Counter updates on the same key are serialized by a
/// compare-and-swap on the entry, so no increment is ever lost.
pub struct ConcurrentCache {
    items: RwLock<HashMap<String, Entry>>,
}

impl Default for ConcurrentCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ConcurrentCache {
    pub fn new() -> Self {
        ConcurrentCache { items: RwLock::new(HashMap::new()) }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        match self.items.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                crate::log::warn("cache: lock recovered after panic");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        match self.items.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                crate::log::warn("cache: lock recovered after panic");
                poisoned.into_inner()
            }
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// `None` for an empty or unknown key.
    pub fn get(&self, key: &str) -> Option<EntrySnapshot> {
        if key.is_empty() {
            return None;
        }
        self.read().get(key).map(Entry::snapshot)
    }

    pub fn put(&self, key: &str) -> Result<(), CacheError> {
        self.put_at(key, Instant::now())
    }

    /// Creates the entry if it is missing and marks it accessed at `now`.
    /// An existing entry keeps its creation time.
    pub fn put_at(&self, key: &str, now: Instant) -> Result<(), CacheError> {
        if key.is_empty() {
            return Err(CacheError::EmptyKey);
        }
        let mut items = self.write();
        let entry = items.entry(key.to_string()).or_insert_with(|| Entry::new(now));
        entry.touch(now);
        Ok(())
    }

    pub fn inc(&self, key: &str) -> Option<EntrySnapshot> {
        self.inc_at(key, Instant::now())
    }

    /// Adds one to the counter of an existing entry. Never creates an entry.
    pub fn inc_at(&self, key: &str, now: Instant) -> Option<EntrySnapshot> {
        self.update(key, 1.0, now)
    }

    pub fn dec(&self, key: &str) -> Option<EntrySnapshot> {
        self.dec_at(key, Instant::now())
    }

    /// Subtracts one. The counter has no lower bound.
    pub fn dec_at(&self, key: &str, now: Instant) -> Option<EntrySnapshot> {
        self.update(key, -1.0, now)
    }

    fn update(&self, key: &str, delta: f64, now: Instant) -> Option<EntrySnapshot> {
        if key.is_empty() {
            return None;
        }
        let items = self.read();
        let entry = items.get(key)?;
        let accessed = entry.touch(now);
        let count = entry.add(delta);
        Some(EntrySnapshot { created: entry.created, accessed, count })
    }

    pub fn del(&self, key: &str) {
        self.write().remove(key);
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
