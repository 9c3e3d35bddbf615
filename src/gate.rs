// Bounded, non-blocking admission gate
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counting semaphore over a fixed pool of anonymous tokens.
/// Acquire never waits: it either takes a token now or fails.
pub struct AdmissionGate {
    capacity: usize,
    available: AtomicUsize,
}

impl AdmissionGate {
    pub fn new(capacity: usize) -> Self {
        AdmissionGate { capacity, available: AtomicUsize::new(capacity) }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.available.load(Ordering::Acquire)
    }

    pub fn in_use(&self) -> usize {
        self.capacity - self.available()
    }

    pub fn try_acquire(&self) -> bool {
        self.available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Returns one token. The pool never grows past its capacity.
    pub fn release(&self) {
        let cap = self.capacity;
        let returned = self
            .available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| if n < cap { Some(n + 1) } else { None });
        if returned.is_err() {
            crate::log::warn("admission gate: release without a matching acquire");
        }
    }

    /// Scoped form of `try_acquire`: the token goes back when the permit drops.
    pub fn try_permit(self: &Arc<Self>) -> Option<Permit> {
        if self.try_acquire() {
            Some(Permit { gate: Arc::clone(self) })
        } else {
            None
        }
    }
}

pub struct Permit {
    gate: Arc<AdmissionGate>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.gate.release();
    }
}
