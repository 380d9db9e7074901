//! Gateway Metrics Collection
//!
//! Lock-free counters shared by every request passing through one gateway.

use std::sync::atomic::{AtomicU64, Ordering};

/// Gateway metrics collector
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    // Read path
    reads: AtomicU64,
    local_read_hits: AtomicU64,
    remote_reads: AtomicU64,
    read_failures: AtomicU64,

    // Write path
    writes: AtomicU64,
    forwards_sent: AtomicU64,
    forward_failures: AtomicU64,
    poll_timeouts: AtomicU64,

    // Leases
    lease_releases: AtomicU64,
    lease_invalidations: AtomicU64,

    cache_delegations: AtomicU64,
}

/// Point-in-time copy of [`GatewayMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub reads: u64,
    pub local_read_hits: u64,
    pub remote_reads: u64,
    pub read_failures: u64,
    pub writes: u64,
    pub forwards_sent: u64,
    pub forward_failures: u64,
    pub poll_timeouts: u64,
    pub lease_releases: u64,
    pub lease_invalidations: u64,
    pub cache_delegations: u64,
}

impl GatewayMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_read_hit(&self) {
        self.local_read_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remote_read(&self) {
        self.remote_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read_failure(&self) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forward_sent(&self) {
        self.forwards_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forward_failure(&self) {
        self.forward_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_poll_timeout(&self) {
        self.poll_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_release(&self) {
        self.lease_releases.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidation(&self) {
        self.lease_invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_delegation(&self) {
        self.cache_delegations.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            local_read_hits: self.local_read_hits.load(Ordering::Relaxed),
            remote_reads: self.remote_reads.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            forwards_sent: self.forwards_sent.load(Ordering::Relaxed),
            forward_failures: self.forward_failures.load(Ordering::Relaxed),
            poll_timeouts: self.poll_timeouts.load(Ordering::Relaxed),
            lease_releases: self.lease_releases.load(Ordering::Relaxed),
            lease_invalidations: self.lease_invalidations.load(Ordering::Relaxed),
            cache_delegations: self.cache_delegations.load(Ordering::Relaxed),
        }
    }
}
