// Per-client cumulative-average rate limiter
use crate::cache::ConcurrentCache;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Admits a client while `requests / seconds since first seen` stays below
/// `max_rps`. The average is never reset or decayed, and nothing is rejected
/// inside the grace window that follows an identity's first request.
pub struct RateLimiter {
    cache: Arc<ConcurrentCache>,
    max_rps: f64,
    grace: Duration,
}

impl RateLimiter {
    pub fn new(cache: Arc<ConcurrentCache>, max_rps: f64, grace: Duration) -> Self {
        RateLimiter { cache, max_rps, grace }
    }

    pub fn max_rps(&self) -> f64 {
        self.max_rps
    }

    /// Identities seen so far; entries are never evicted.
    pub fn tracked_clients(&self) -> usize {
        self.cache.len()
    }

    pub fn allow(&self, identity: &str, now: Instant) -> bool {
        if identity.is_empty() {
            return true;
        }
        if !self.cache.has(identity) {
            // first sighting is always admitted
            let _ = self.cache.put_at(identity, now);
            return true;
        }
        let entry = match self.cache.inc_at(identity, now) {
            Some(e) => e,
            // deleted between the two calls
            None => return true,
        };
        let elapsed = now.saturating_duration_since(entry.created);
        if elapsed <= self.grace {
            return true;
        }
        entry.count / elapsed.as_secs_f64() < self.max_rps
    }
}

/// Host part of a `host:port` address, split at the last colon.
/// An address without a colon is returned unchanged.
pub fn client_host(remote_addr: &str) -> &str {
    match remote_addr.rfind(':') {
        Some(i) => &remote_addr[..i],
        None => remote_addr,
    }
}

/// Stable cache key for a client: hex SHA-256 of the host, joined with the
/// forwarding header when one is present. Empty when neither is known.
pub fn identity(remote_addr: &str, forwarded_for: Option<&str>) -> String {
    let host = client_host(remote_addr);
    let material = match forwarded_for.map(str::trim).filter(|v| !v.is_empty()) {
        Some(xff) => format!("{host}_{xff}"),
        None if host.is_empty() => return String::new(),
        None => host.to_string(),
    };
    let mut hasher = Sha256::new();
    hasher.update(material.as_bytes());
    format!("{:x}", hasher.finalize())
}
