//! Gateway Façade
//!
//! Entry point for object requests on this node. Applies the read-only and
//! cache policy gates, then hands the request to the read path or the
//! write fan-out.
//!
//! # Example
//!
//! ```ignore
//! let gateway = Gateway::new(local, store, peers, pool, epochs)
//!     .with_config(config)?
//!     .with_cache(cache);
//!
//! let code = gateway.write(&mut request).await;
//! ```

pub mod config;
mod forward;
mod forward_set;
mod metrics;
mod read;

use std::sync::Arc;

use tracing::{instrument, warn};

use crate::adapters::DisabledObjectCache;
use crate::domain::{
    ConnectionLease, EpochPolicy, LocalStore, NodeId, ObjectCache, Opcode, PeerExecutor, Request,
    ResultCode,
};
use crate::error::Result;

pub use config::{parse_duration, GatewayConfig};
pub use forward_set::{ForwardEntry, ForwardSet};
pub use metrics::{GatewayMetrics, MetricsSnapshot};

/// Replication gateway bound to one node.
pub struct Gateway<L: ConnectionLease> {
    local: NodeId,
    config: GatewayConfig,
    store: Arc<dyn LocalStore>,
    peers: Arc<dyn PeerExecutor>,
    lease: Arc<L>,
    cache: Arc<dyn ObjectCache>,
    epochs: Arc<dyn EpochPolicy>,
    metrics: Arc<GatewayMetrics>,
}

impl<L: ConnectionLease> Gateway<L> {
    /// Create a gateway with default configuration and no object cache.
    pub fn new(
        local: NodeId,
        store: Arc<dyn LocalStore>,
        peers: Arc<dyn PeerExecutor>,
        lease: Arc<L>,
        epochs: Arc<dyn EpochPolicy>,
    ) -> Self {
        Self {
            local,
            config: GatewayConfig::default(),
            store,
            peers,
            lease,
            cache: Arc::new(DisabledObjectCache),
            epochs,
            metrics: Arc::new(GatewayMetrics::new()),
        }
    }

    /// Replace the configuration after validating it.
    pub fn with_config(mut self, config: GatewayConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn with_cache(mut self, cache: Arc<dyn ObjectCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn local_node(&self) -> &NodeId {
        &self.local
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.metrics
    }

    /// Dispatch on the request's opcode.
    pub async fn handle(&self, req: &mut Request) -> ResultCode {
        match req.header.opcode {
            Opcode::ReadObj => self.read(req).await,
            Opcode::WriteObj => self.write(req).await,
            Opcode::CreateAndWriteObj => self.create_and_write(req).await,
            Opcode::RemoveObj => self.remove(req).await,
            other => {
                warn!(opcode = ?other, oid = %req.oid(), "Unsupported gateway opcode");
                ResultCode::InvalidParams
            }
        }
    }

    /// Read one copy of the object into the request's response buffer.
    #[instrument(skip(self, req), fields(oid = %req.oid(), epoch = req.epoch()))]
    pub async fn read(&self, req: &mut Request) -> ResultCode {
        self.metrics.record_read();
        if self.use_cache(req) {
            self.metrics.record_cache_delegation();
            return self.cache.handle(req).await;
        }
        self.read_replicas(req).await
    }

    /// Write the payload to every copy.
    #[instrument(skip(self, req), fields(oid = %req.oid(), epoch = req.epoch()))]
    pub async fn write(&self, req: &mut Request) -> ResultCode {
        self.write_all(req).await
    }

    /// Create the object on every copy and write its initial payload.
    #[instrument(skip(self, req), fields(oid = %req.oid(), epoch = req.epoch()))]
    pub async fn create_and_write(&self, req: &mut Request) -> ResultCode {
        self.write_all(req).await
    }

    /// Remove the object from every copy. Never served by the cache.
    #[instrument(skip(self, req), fields(oid = %req.oid(), epoch = req.epoch()))]
    pub async fn remove(&self, req: &Request) -> ResultCode {
        self.metrics.record_write();
        self.forward_request(req).await
    }

    async fn write_all(&self, req: &mut Request) -> ResultCode {
        self.metrics.record_write();
        if req.view.is_readonly(req.oid()) {
            warn!("Refusing write to read-only object");
            return ResultCode::ReadOnly;
        }
        if self.use_cache(req) {
            self.metrics.record_cache_delegation();
            return self.cache.handle(req).await;
        }
        self.forward_request(req).await
    }

    fn use_cache(&self, req: &Request) -> bool {
        self.cache.is_enabled() && !req.local && !self.cache.should_bypass(req)
    }

    fn release(&self, node: &NodeId, conn: L::Conn) {
        self.metrics.record_release();
        self.lease.release(node, conn);
    }

    fn invalidate(&self, node: &NodeId, conn: L::Conn) {
        self.metrics.record_invalidation();
        self.lease.invalidate(node, conn);
    }
}
