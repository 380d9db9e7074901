//! Peer server: executes peer requests from other gateways against the
//! local store.

use std::future::Future;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use super::codec::{REQUEST_HEADER_SIZE, RESPONSE_HEADER_SIZE};
use crate::domain::{LocalStore, RequestHeader};
use crate::error::{Error, Result};
use crate::MAX_PAYLOAD_SIZE;

/// Accept loop serving one [`LocalStore`].
pub struct PeerServer {
    listener: TcpListener,
    store: Arc<dyn LocalStore>,
}

impl PeerServer {
    pub async fn bind(addr: SocketAddr, store: Arc<dyn LocalStore>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, store })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until the listener fails.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` completes.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        info!(addr = %self.local_addr()?, "Peer server listening");
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                accepted = self.listener.accept() => accepted?,
                _ = &mut shutdown => {
                    info!("Peer server shutting down");
                    return Ok(());
                }
            };

            let store = Arc::clone(&self.store);
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, store).await {
                    warn!(peer = %peer, error = %e, "Peer connection error");
                }
            });
        }
    }
}

async fn serve_connection(mut stream: TcpStream, store: Arc<dyn LocalStore>) -> Result<()> {
    stream.set_nodelay(true)?;
    let mut head = [0u8; REQUEST_HEADER_SIZE];

    loop {
        match stream.read_exact(&mut head).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        let header = RequestHeader::decode(&mut &head[..])?;

        let len = header.data_length as usize;
        if header.opcode.carries_payload() && len > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                len,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        let payload = if header.opcode.carries_payload() && len > 0 {
            let mut buf = vec![0u8; len];
            stream.read_exact(&mut buf).await?;
            Bytes::from(buf)
        } else {
            Bytes::new()
        };

        let reply = store.serve_local(&header, payload).await;
        debug!(oid = %header.oid, opcode = ?header.opcode, result = %reply.result(), "Served peer request");

        let mut out = BytesMut::with_capacity(RESPONSE_HEADER_SIZE + reply.data.len());
        let mut rsp = reply.header;
        rsp.data_length = reply.data.len() as u32;
        rsp.encode(&mut out);
        out.extend_from_slice(&reply.data);
        stream.write_all(&out).await?;
    }
}
