//! Single-shot remote execution over leased connections.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use super::retry::IoRetry;
use crate::domain::{
    ConnectionLease, EpochPolicy, NodeId, PeerConnection, PeerExecutor, PeerReply, RequestHeader,
};
use crate::error::Result;
use crate::{DEFAULT_POLL_TIMEOUT, MAX_RETRY_COUNT};

/// [`PeerExecutor`] that borrows a connection per exchange.
///
/// The connection goes back to the pool after a complete exchange and is
/// invalidated after any failure.
pub struct TcpPeerExecutor<L: ConnectionLease> {
    lease: Arc<L>,
    epochs: Arc<dyn EpochPolicy>,
    io_timeout: Duration,
    max_retries: u32,
}

impl<L: ConnectionLease> TcpPeerExecutor<L> {
    pub fn new(lease: Arc<L>, epochs: Arc<dyn EpochPolicy>) -> Self {
        Self {
            lease,
            epochs,
            io_timeout: DEFAULT_POLL_TIMEOUT,
            max_retries: MAX_RETRY_COUNT,
        }
    }

    pub fn with_io_timeout(mut self, io_timeout: Duration, max_retries: u32) -> Self {
        self.io_timeout = io_timeout;
        self.max_retries = max_retries;
        self
    }

    async fn exchange(
        &self,
        node: &NodeId,
        conn: &mut L::Conn,
        header: &RequestHeader,
        payload: &[u8],
    ) -> Result<PeerReply> {
        let io = IoRetry::new(
            self.io_timeout,
            self.max_retries,
            self.epochs.as_ref(),
            header.epoch,
        );

        conn.queue_request(header, payload);
        io.flush(node, conn).await?;
        let rsp = io.read_response(node, conn).await?;
        let data = if rsp.data_length > 0 {
            io.read_payload(node, conn, rsp.data_length as usize).await?
        } else {
            Bytes::new()
        };
        Ok(PeerReply::new(rsp, data))
    }
}

#[async_trait]
impl<L: ConnectionLease> PeerExecutor for TcpPeerExecutor<L> {
    async fn send_and_receive(
        &self,
        node: &NodeId,
        header: &RequestHeader,
        payload: Bytes,
    ) -> Result<PeerReply> {
        let mut conn = self.lease.acquire(node).await?;
        match self.exchange(node, &mut conn, header, &payload).await {
            Ok(reply) => {
                debug!(node = %node, oid = %header.oid, result = %reply.result(), "Peer replied");
                self.lease.release(node, conn);
                Ok(reply)
            }
            Err(e) => {
                warn!(node = %node, oid = %header.oid, error = %e, "Peer exchange failed");
                self.lease.invalidate(node, conn);
                Err(e)
            }
        }
    }
}
