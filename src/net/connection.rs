//! TCP connection to a peer.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt, Interest};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::codec::{REQUEST_HEADER_SIZE, RESPONSE_HEADER_SIZE};
use crate::domain::{NodeId, PeerConnection, Readiness, RequestHeader, ResponseHeader};
use crate::error::{Error, Result};
use crate::MAX_PAYLOAD_SIZE;

/// Buffered TCP stream speaking the 48-byte header protocol.
///
/// Outbound and inbound bytes live in the connection's own buffers, so
/// dropping a pending `flush` or `read_*` future never loses data.
#[derive(Debug)]
pub struct TcpPeerConnection {
    node: NodeId,
    stream: TcpStream,
    outbound: BytesMut,
    inbound: BytesMut,
    max_payload: usize,
}

impl TcpPeerConnection {
    /// Connect to `node` within `connect_timeout`.
    pub async fn connect(node: NodeId, connect_timeout: Duration) -> Result<Self> {
        let stream = match timeout(connect_timeout, TcpStream::connect(node.addr())).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(Error::Connect {
                    node,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(Error::Connect {
                    node,
                    reason: format!("timed out after {:?}", connect_timeout),
                })
            }
        };
        stream.set_nodelay(true)?;
        debug!(node = %node, "Connected to peer");
        Ok(Self::from_stream(node, stream))
    }

    /// Wrap an already connected stream.
    pub fn from_stream(node: NodeId, stream: TcpStream) -> Self {
        Self {
            node,
            stream,
            outbound: BytesMut::with_capacity(REQUEST_HEADER_SIZE),
            inbound: BytesMut::with_capacity(RESPONSE_HEADER_SIZE),
            max_payload: MAX_PAYLOAD_SIZE,
        }
    }

    /// Refuse response payloads longer than `max_payload` bytes.
    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self
    }

    pub fn node(&self) -> &NodeId {
        &self.node
    }

    /// True if bytes are queued or buffered that belong to an unfinished exchange.
    pub fn is_dirty(&self) -> bool {
        !self.outbound.is_empty() || !self.inbound.is_empty()
    }

    async fn fill_inbound(&mut self, len: usize) -> Result<()> {
        while self.inbound.len() < len {
            self.inbound.reserve(len - self.inbound.len());
            let n = self.stream.read_buf(&mut self.inbound).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed { node: self.node });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PeerConnection for TcpPeerConnection {
    fn queue_request(&mut self, header: &RequestHeader, payload: &[u8]) {
        self.outbound.reserve(REQUEST_HEADER_SIZE + payload.len());
        header.encode(&mut self.outbound);
        self.outbound.extend_from_slice(payload);
    }

    async fn flush(&mut self) -> Result<()> {
        while !self.outbound.is_empty() {
            let n = self.stream.write_buf(&mut self.outbound).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed { node: self.node });
            }
        }
        Ok(())
    }

    async fn ready(&self) -> Readiness {
        if !self.inbound.is_empty() {
            return Readiness::Readable;
        }
        match self.stream.ready(Interest::READABLE).await {
            Ok(ready) if ready.is_error() => Readiness::Error,
            Ok(ready) if ready.is_read_closed() => {
                // A reply may arrive together with the FIN; it is only a
                // hangup once nothing is left to read.
                let mut byte = [0u8; 1];
                match self.stream.peek(&mut byte).await {
                    Ok(n) if n > 0 => Readiness::Readable,
                    _ => Readiness::Hangup,
                }
            }
            Ok(_) => Readiness::Readable,
            Err(_) => Readiness::Error,
        }
    }

    async fn read_response(&mut self) -> Result<ResponseHeader> {
        self.fill_inbound(RESPONSE_HEADER_SIZE).await?;
        let mut head = self.inbound.split_to(RESPONSE_HEADER_SIZE);
        ResponseHeader::decode(&mut head)
    }

    async fn read_payload(&mut self, len: usize) -> Result<Bytes> {
        if len > self.max_payload {
            return Err(Error::Codec(format!(
                "{} announced a {len} byte payload, limit is {}",
                self.node, self.max_payload
            )));
        }
        self.fill_inbound(len).await?;
        Ok(self.inbound.split_to(len).freeze())
    }
}
