// Lock-free metrics using atomic counters
use std::fmt::{Display, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

static START_TIME: OnceLock<Instant> = OnceLock::new();

static REQUESTS_TOTAL: AtomicU64 = AtomicU64::new(0);
static REQUESTS_OK: AtomicU64 = AtomicU64::new(0);
static REQUESTS_ERR: AtomicU64 = AtomicU64::new(0);
static REJECTED_CAPACITY: AtomicU64 = AtomicU64::new(0);
static REJECTED_RATE: AtomicU64 = AtomicU64::new(0);
static CONNECTIONS_TOTAL: AtomicU64 = AtomicU64::new(0);
static ACTIVE_CONNECTIONS: AtomicU64 = AtomicU64::new(0);
static FORCED_CLOSES: AtomicU64 = AtomicU64::new(0);
static LATENCY_SUM_MS: AtomicU64 = AtomicU64::new(0);
static LATENCY_MAX_MS: AtomicU64 = AtomicU64::new(0);

pub fn init() {
    START_TIME.get_or_init(Instant::now);
}

#[inline]
pub fn inc_requests() { REQUESTS_TOTAL.fetch_add(1, Ordering::Relaxed); }

#[inline]
pub fn inc_requests_ok() { REQUESTS_OK.fetch_add(1, Ordering::Relaxed); }

#[inline]
pub fn inc_requests_err() { REQUESTS_ERR.fetch_add(1, Ordering::Relaxed); }

#[inline]
pub fn inc_rejected_capacity() { REJECTED_CAPACITY.fetch_add(1, Ordering::Relaxed); }

#[inline]
pub fn inc_rejected_rate() { REJECTED_RATE.fetch_add(1, Ordering::Relaxed); }

#[inline]
pub fn add_forced_closes(n: u64) { FORCED_CLOSES.fetch_add(n, Ordering::Relaxed); }

pub fn connection_opened() {
    CONNECTIONS_TOTAL.fetch_add(1, Ordering::Relaxed);
    ACTIVE_CONNECTIONS.fetch_add(1, Ordering::Relaxed);
}

pub fn connection_closed() {
    ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::Relaxed);
}

#[inline]
pub fn record_latency(ms: u64) {
    LATENCY_SUM_MS.fetch_add(ms, Ordering::Relaxed);
    LATENCY_MAX_MS.fetch_max(ms, Ordering::Relaxed);
}

pub struct Snapshot {
    pub requests_total: u64,
    pub requests_ok: u64,
    pub requests_err: u64,
    pub rejected_capacity: u64,
    pub rejected_rate: u64,
    pub connections_total: u64,
    pub active_connections: u64,
    pub forced_closes: u64,
    pub latency_sum_ms: u64,
    pub latency_max_ms: u64,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        requests_total: REQUESTS_TOTAL.load(Ordering::Relaxed),
        requests_ok: REQUESTS_OK.load(Ordering::Relaxed),
        requests_err: REQUESTS_ERR.load(Ordering::Relaxed),
        rejected_capacity: REJECTED_CAPACITY.load(Ordering::Relaxed),
        rejected_rate: REJECTED_RATE.load(Ordering::Relaxed),
        connections_total: CONNECTIONS_TOTAL.load(Ordering::Relaxed),
        active_connections: ACTIVE_CONNECTIONS.load(Ordering::Relaxed),
        forced_closes: FORCED_CLOSES.load(Ordering::Relaxed),
        latency_sum_ms: LATENCY_SUM_MS.load(Ordering::Relaxed),
        latency_max_ms: LATENCY_MAX_MS.load(Ordering::Relaxed),
    }
}

pub fn uptime_secs() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

/// Prometheus text format, one `HELP`/`TYPE`/sample triple per family.
pub struct Exposition {
    ns: &'static str,
    out: String,
}

impl Exposition {
    pub fn new(ns: &'static str) -> Self {
        Exposition { ns, out: String::new() }
    }

    pub fn counter(&mut self, name: &str, help: &str, v: u64) {
        self.family(name, "counter", help, v);
    }

    pub fn gauge(&mut self, name: &str, help: &str, v: impl Display) {
        self.family(name, "gauge", help, v);
    }

    fn family(&mut self, name: &str, kind: &str, help: &str, v: impl Display) {
        let ns = self.ns;
        let _ = writeln!(self.out, "# HELP {ns}_{name} {help}");
        let _ = writeln!(self.out, "# TYPE {ns}_{name} {kind}");
        let _ = writeln!(self.out, "{ns}_{name} {v}");
    }

    pub fn finish(self) -> String {
        self.out
    }
}
