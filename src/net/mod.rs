//! Network layer: header codec, TCP connections, the socket pool, the
//! single-shot peer executor and the peer server.

pub mod codec;
mod connection;
mod executor;
mod pool;
mod retry;
mod server;

pub use codec::{REQUEST_HEADER_SIZE, RESPONSE_HEADER_SIZE};
pub use connection::TcpPeerConnection;
pub use executor::TcpPeerExecutor;
pub use pool::{PoolConfig, PoolStats, SocketPool};
pub use retry::{IoRetry, RetryBudget};
pub use server::PeerServer;
