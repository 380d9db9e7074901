//! Connection Lease
//!
//! Per-node pool of idle peer connections. A lease moves a connection out
//! of the pool; it comes back only through [`ConnectionLease::release`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use tracing::{debug, info};

use super::connection::TcpPeerConnection;
use crate::domain::{ConnectionLease, NodeId};
use crate::error::Result;
use crate::gateway::config::deserialize_duration;
use crate::MAX_PAYLOAD_SIZE;

/// Socket pool configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Bound on establishing a new connection
    #[serde(deserialize_with = "deserialize_duration")]
    pub connect_timeout: Duration,

    /// Idle connections kept per node; extras are closed on release
    pub max_idle_per_node: usize,

    /// Longest response payload a pooled connection accepts
    pub max_payload: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            max_idle_per_node: 8,
            max_payload: MAX_PAYLOAD_SIZE,
        }
    }
}

/// Pool statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub connects: u64,
    pub reuses: u64,
    pub releases: u64,
    pub invalidations: u64,
    pub purges: u64,
}

/// TCP implementation of [`ConnectionLease`].
pub struct SocketPool {
    config: PoolConfig,
    idle: DashMap<NodeId, Vec<TcpPeerConnection>>,
    connects: AtomicU64,
    reuses: AtomicU64,
    releases: AtomicU64,
    invalidations: AtomicU64,
    purges: AtomicU64,
}

impl SocketPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            idle: DashMap::new(),
            connects: AtomicU64::new(0),
            reuses: AtomicU64::new(0),
            releases: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
            purges: AtomicU64::new(0),
        }
    }

    /// Idle connections currently pooled for `node`.
    pub fn idle_count(&self, node: &NodeId) -> usize {
        self.idle.get(node).map(|v| v.len()).unwrap_or(0)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            connects: self.connects.load(Ordering::Relaxed),
            reuses: self.reuses.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            purges: self.purges.load(Ordering::Relaxed),
        }
    }

    fn take_idle(&self, node: &NodeId) -> Option<TcpPeerConnection> {
        self.idle.get_mut(node).and_then(|mut v| v.pop())
    }
}

impl Default for SocketPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

#[async_trait]
impl ConnectionLease for SocketPool {
    type Conn = TcpPeerConnection;

    async fn acquire(&self, node: &NodeId) -> Result<TcpPeerConnection> {
        // The shard guard is dropped before connecting.
        if let Some(conn) = self.take_idle(node) {
            self.reuses.fetch_add(1, Ordering::Relaxed);
            return Ok(conn);
        }
        let conn = TcpPeerConnection::connect(*node, self.config.connect_timeout)
            .await?
            .with_max_payload(self.config.max_payload);
        self.connects.fetch_add(1, Ordering::Relaxed);
        Ok(conn)
    }

    fn release(&self, node: &NodeId, conn: TcpPeerConnection) {
        self.releases.fetch_add(1, Ordering::Relaxed);
        if conn.is_dirty() {
            debug!(node = %node, "Dropping released connection with unread bytes");
            return;
        }
        let mut idle = self.idle.entry(*node).or_default();
        if idle.len() < self.config.max_idle_per_node {
            idle.push(conn);
        }
    }

    fn invalidate(&self, node: &NodeId, conn: TcpPeerConnection) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        debug!(node = %node, "Closing invalidated connection");
        drop(conn);
    }

    fn invalidate_all_for_node(&self, node: &NodeId) {
        self.purges.fetch_add(1, Ordering::Relaxed);
        if let Some((_, conns)) = self.idle.remove(node) {
            info!(node = %node, closed = conns.len(), "Purged idle connections");
        }
    }
}
