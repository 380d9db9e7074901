//! Domain Ports (Port/Adapter Pattern)
//!
//! The collaborators the gateway depends on but does not own. Adapters in
//! [`crate::adapters`] and [`crate::net`] implement these traits; tests
//! inject scripted doubles.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Gateway                              │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │ LocalStore │ PeerExecutor │ ConnectionLease │ Cache  │    │
//! │  │ EpochPolicy │ PeerConnection                         │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  InMemoryLocalStore │ TcpPeerExecutor │ SocketPool          │
//! │  EpochTracker │ DisabledObjectCache │ TcpPeerConnection     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use bytes::Bytes;

use super::request::{flags, PeerReply, Request, RequestHeader, ResponseHeader};
use super::result::ResultCode;
use super::types::{Epoch, NodeId};
use crate::error::Result;

// =============================================================================
// Local Storage Port
// =============================================================================

/// Entry point of the storage service running on this node.
///
/// Invoked only for replicas that placement resolves to the local node;
/// the gateway never reaches itself over the network.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Execute a peer-opcode request against the local object store.
    async fn serve_local(&self, header: &RequestHeader, data: Bytes) -> PeerReply;
}

// =============================================================================
// Remote Execution Port
// =============================================================================

/// Single-shot request/response exchange with one remote node.
#[async_trait]
pub trait PeerExecutor: Send + Sync {
    /// Send `header` and `payload` to `node` and wait for its reply.
    ///
    /// `Err` means the exchange itself failed; a peer that answered with a
    /// failure code returns `Ok` with that code in the reply header.
    async fn send_and_receive(
        &self,
        node: &NodeId,
        header: &RequestHeader,
        payload: Bytes,
    ) -> Result<PeerReply>;
}

// =============================================================================
// Connection Lease Port
// =============================================================================

/// What a readiness wait observed on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Response bytes are available
    Readable,
    /// Peer closed its end
    Hangup,
    /// Socket error or invalid descriptor
    Error,
}

impl Readiness {
    pub fn is_readable(&self) -> bool {
        *self == Readiness::Readable
    }
}

/// A leased connection to one peer.
///
/// `flush`, `read_response` and `read_payload` must be cancellation safe:
/// dropping the future before completion loses no bytes, so callers may
/// wrap them in a timeout and retry.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Encode a request into the outbound buffer.
    fn queue_request(&mut self, header: &RequestHeader, payload: &[u8]);

    /// Write out everything queued.
    async fn flush(&mut self) -> Result<()>;

    /// Resolve once the connection is readable, hung up, or in error.
    async fn ready(&self) -> Readiness;

    /// Read one fixed-size response header.
    async fn read_response(&mut self) -> Result<ResponseHeader>;

    /// Read `len` payload bytes following a response header.
    async fn read_payload(&mut self, len: usize) -> Result<Bytes>;
}

/// Pooled connections keyed by node.
///
/// Shared by every in-flight request. Implementations serialize their own
/// bookkeeping; each call is atomic from the gateway's point of view.
#[async_trait]
pub trait ConnectionLease: Send + Sync {
    type Conn: PeerConnection + 'static;

    /// Borrow a connection to `node`, connecting if none is idle.
    async fn acquire(&self, node: &NodeId) -> Result<Self::Conn>;

    /// Return a healthy connection to the pool.
    fn release(&self, node: &NodeId, conn: Self::Conn);

    /// Discard a connection whose state is unknown.
    fn invalidate(&self, node: &NodeId, conn: Self::Conn);

    /// Discard every idle connection to `node`.
    fn invalidate_all_for_node(&self, node: &NodeId);
}

// =============================================================================
// Object Cache Port
// =============================================================================

/// Object cache that may absorb a request before it reaches replicas.
#[async_trait]
pub trait ObjectCache: Send + Sync {
    fn is_enabled(&self) -> bool;

    /// True if `req` must skip the cache.
    ///
    /// Only data objects of requests that opted into caching, and did not
    /// ask for direct I/O, go through the cache.
    fn should_bypass(&self, req: &Request) -> bool {
        !req.header.has_flag(flags::CMD_CACHE)
            || req.header.has_flag(flags::CMD_DIRECT)
            || !req.oid().is_data()
    }

    /// Serve `req` entirely from the cache layer.
    async fn handle(&self, req: &mut Request) -> ResultCode;
}

// =============================================================================
// Epoch Port
// =============================================================================

/// Decides whether a stalled operation may keep waiting.
pub trait EpochPolicy: Send + Sync {
    /// True while the cluster is still at `epoch`, so a timeout is more
    /// likely congestion than a membership change.
    fn need_retry(&self, epoch: Epoch) -> bool;
}

// =============================================================================
// Tests
// =============================================================================
