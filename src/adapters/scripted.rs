//! Scripted collaborators for exercising the gateway without a cluster.
//!
//! Each double follows a per-node script and records what the gateway did
//! to it, so tests can assert on exact lease and network activity. Timing
//! uses `tokio::time`, which makes readiness order deterministic under a
//! paused clock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::time::{sleep_until, Instant};

use crate::domain::{
    ConnectionLease, LocalStore, NodeId, ObjectCache, PeerConnection, PeerExecutor, PeerReply,
    Readiness, Request, RequestHeader, ResponseHeader, ResultCode,
};
use crate::error::{Error, Result};

// =============================================================================
// Connection Lease
// =============================================================================

/// Behaviour of every connection leased to one node.
#[derive(Debug, Clone)]
pub struct NodeScript {
    pub fail_acquire: bool,
    pub fail_send: bool,
    pub fail_read: bool,
    /// Time from send until the connection reports an event; `None` never does
    pub ready_after: Option<Duration>,
    pub readiness: Readiness,
    pub response: ResultCode,
    pub payload: Bytes,
}

impl Default for NodeScript {
    fn default() -> Self {
        Self {
            fail_acquire: false,
            fail_send: false,
            fail_read: false,
            ready_after: Some(Duration::from_millis(1)),
            readiness: Readiness::Readable,
            response: ResultCode::Success,
            payload: Bytes::new(),
        }
    }
}

impl NodeScript {
    /// Accepts, answers success after 1ms.
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn ready_after(mut self, delay: Duration) -> Self {
        self.ready_after = Some(delay);
        self
    }

    pub fn never_ready(mut self) -> Self {
        self.ready_after = None;
        self
    }

    pub fn fail_acquire(mut self) -> Self {
        self.fail_acquire = true;
        self
    }

    pub fn fail_send(mut self) -> Self {
        self.fail_send = true;
        self
    }

    pub fn fail_read(mut self) -> Self {
        self.fail_read = true;
        self
    }

    pub fn hangup(mut self) -> Self {
        self.readiness = Readiness::Hangup;
        self
    }

    pub fn respond(mut self, code: ResultCode) -> Self {
        self.response = code;
        self
    }

    /// Attach stray payload bytes to the response.
    pub fn with_payload(mut self, payload: Bytes) -> Self {
        self.payload = payload;
        self
    }
}

/// One call the gateway made on the lease or a leased connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseEvent {
    Acquire(NodeId),
    Send(NodeId),
    Release(NodeId),
    Invalidate(NodeId),
    InvalidateAll(NodeId),
}

type EventLog = Arc<Mutex<Vec<LeaseEvent>>>;

/// Connection following a [`NodeScript`].
#[derive(Debug)]
pub struct ScriptedConnection {
    node: NodeId,
    script: NodeScript,
    queued: Option<RequestHeader>,
    sent_at: Option<Instant>,
    log: EventLog,
}

#[async_trait]
impl PeerConnection for ScriptedConnection {
    fn queue_request(&mut self, header: &RequestHeader, _payload: &[u8]) {
        self.queued = Some(header.clone());
    }

    async fn flush(&mut self) -> Result<()> {
        if self.script.fail_send {
            return Err(Error::ConnectionClosed { node: self.node });
        }
        self.log.lock().push(LeaseEvent::Send(self.node));
        self.sent_at = Some(Instant::now());
        Ok(())
    }

    async fn ready(&self) -> Readiness {
        match (self.script.ready_after, self.sent_at) {
            (Some(delay), Some(sent_at)) => {
                sleep_until(sent_at + delay).await;
                self.script.readiness
            }
            _ => std::future::pending().await,
        }
    }

    async fn read_response(&mut self) -> Result<ResponseHeader> {
        if self.script.fail_read {
            return Err(Error::ConnectionClosed { node: self.node });
        }
        let Some(header) = self.queued.take() else {
            return Err(Error::Codec("no request outstanding".into()));
        };
        let mut rsp = ResponseHeader::for_request(&header, self.script.response);
        rsp.data_length = self.script.payload.len() as u32;
        Ok(rsp)
    }

    async fn read_payload(&mut self, len: usize) -> Result<Bytes> {
        Ok(self.script.payload.slice(..len.min(self.script.payload.len())))
    }
}

/// [`ConnectionLease`] handing out [`ScriptedConnection`]s.
#[derive(Debug, Default)]
pub struct ScriptedLease {
    scripts: Mutex<HashMap<NodeId, NodeScript>>,
    log: EventLog,
}

impl ScriptedLease {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `node`; unscripted nodes behave as [`NodeScript::ok`].
    pub fn script(&self, node: NodeId, script: NodeScript) {
        self.scripts.lock().insert(node, script);
    }

    pub fn events(&self) -> Vec<LeaseEvent> {
        self.log.lock().clone()
    }

    pub fn clear_events(&self) {
        self.log.lock().clear();
    }

    /// Nodes a request was sent to, in send order.
    pub fn sends(&self) -> Vec<NodeId> {
        self.nodes_where(|e| match e {
            LeaseEvent::Send(node) => Some(*node),
            _ => None,
        })
    }

    /// Nodes whose connection was released, in release order.
    pub fn releases(&self) -> Vec<NodeId> {
        self.nodes_where(|e| match e {
            LeaseEvent::Release(node) => Some(*node),
            _ => None,
        })
    }

    /// Nodes whose connection was invalidated, in invalidation order.
    pub fn invalidations(&self) -> Vec<NodeId> {
        self.nodes_where(|e| match e {
            LeaseEvent::Invalidate(node) => Some(*node),
            _ => None,
        })
    }

    pub fn purges(&self) -> Vec<NodeId> {
        self.nodes_where(|e| match e {
            LeaseEvent::InvalidateAll(node) => Some(*node),
            _ => None,
        })
    }

    fn nodes_where(&self, f: impl Fn(&LeaseEvent) -> Option<NodeId>) -> Vec<NodeId> {
        self.log.lock().iter().filter_map(f).collect()
    }
}

#[async_trait]
impl ConnectionLease for ScriptedLease {
    type Conn = ScriptedConnection;

    async fn acquire(&self, node: &NodeId) -> Result<ScriptedConnection> {
        self.log.lock().push(LeaseEvent::Acquire(*node));
        let script = self.scripts.lock().get(node).cloned().unwrap_or_default();
        if script.fail_acquire {
            return Err(Error::Connect {
                node: *node,
                reason: "scripted refusal".into(),
            });
        }
        Ok(ScriptedConnection {
            node: *node,
            script,
            queued: None,
            sent_at: None,
            log: Arc::clone(&self.log),
        })
    }

    fn release(&self, node: &NodeId, _conn: ScriptedConnection) {
        self.log.lock().push(LeaseEvent::Release(*node));
    }

    fn invalidate(&self, node: &NodeId, _conn: ScriptedConnection) {
        self.log.lock().push(LeaseEvent::Invalidate(*node));
    }

    fn invalidate_all_for_node(&self, node: &NodeId) {
        self.log.lock().push(LeaseEvent::InvalidateAll(*node));
    }
}

// =============================================================================
// Remote execution
// =============================================================================

/// Outcome of one scripted remote exchange.
#[derive(Debug, Clone)]
pub enum PeerScript {
    Reply(ResultCode, Bytes),
    Fail,
}

/// [`PeerExecutor`] answering from per-node scripts.
#[derive(Debug, Default)]
pub struct ScriptedPeers {
    scripts: Mutex<HashMap<NodeId, PeerScript>>,
    calls: Mutex<Vec<NodeId>>,
}

impl ScriptedPeers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `node`; unscripted nodes fail the exchange.
    pub fn script(&self, node: NodeId, script: PeerScript) {
        self.scripts.lock().insert(node, script);
    }

    /// Nodes contacted, in call order.
    pub fn calls(&self) -> Vec<NodeId> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl PeerExecutor for ScriptedPeers {
    async fn send_and_receive(
        &self,
        node: &NodeId,
        header: &RequestHeader,
        _payload: Bytes,
    ) -> Result<PeerReply> {
        self.calls.lock().push(*node);
        let script = self.scripts.lock().get(node).cloned();
        match script {
            Some(PeerScript::Reply(code, data)) => {
                let mut rsp = ResponseHeader::for_request(header, code);
                rsp.data_length = data.len() as u32;
                Ok(PeerReply::new(rsp, data))
            }
            Some(PeerScript::Fail) | None => Err(Error::ConnectionClosed { node: *node }),
        }
    }
}

// =============================================================================
// Local store and cache
// =============================================================================

/// [`LocalStore`] answering every request with one fixed reply.
#[derive(Debug)]
pub struct ScriptedStore {
    result: ResultCode,
    data: Bytes,
    calls: Mutex<Vec<RequestHeader>>,
}

impl ScriptedStore {
    pub fn new(result: ResultCode, data: Bytes) -> Self {
        Self {
            result,
            data,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding(data: Bytes) -> Self {
        Self::new(ResultCode::Success, data)
    }

    pub fn failing(result: ResultCode) -> Self {
        Self::new(result, Bytes::new())
    }

    /// Headers the gateway passed in, in call order.
    pub fn calls(&self) -> Vec<RequestHeader> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl LocalStore for ScriptedStore {
    async fn serve_local(&self, header: &RequestHeader, _data: Bytes) -> PeerReply {
        self.calls.lock().push(header.clone());
        let mut rsp = ResponseHeader::for_request(header, self.result);
        rsp.data_length = self.data.len() as u32;
        PeerReply::new(rsp, self.data.clone())
    }
}

/// Enabled cache answering every request with one code.
#[derive(Debug)]
pub struct RecordingCache {
    result: ResultCode,
    calls: AtomicUsize,
}

impl RecordingCache {
    pub fn new(result: ResultCode) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ObjectCache for RecordingCache {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn handle(&self, _req: &mut Request) -> ResultCode {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.result
    }
}
