//! Replica Gateway - request forwarding for a replicated object store
//!
//! Receives a request naming a logical object, maps it to the nodes holding
//! its copies, and either reads one live copy or writes every copy.
//!
//! # Architecture
//!
//! ```text
//! Gateway façade → Placement → Read path / Write fan-out → Connection lease
//!                                              │
//!                                              └→ Forward set (drain loop)
//! ```
//!
//! - Reads try the local copy first, then remote copies round-robin from a
//!   random start.
//! - Writes go to every copy in placement order and the gateway waits for
//!   every issued forward before answering.
//! - Every request ends with exactly one [`ResultCode`]; per-replica detail
//!   goes to the log.
//!
//! # Modules
//!
//! - [`adapters`] - Local store, epoch tracker, cache and test doubles
//! - [`domain`] - Value types, request envelopes and ports
//! - [`error`] - Error types
//! - [`gateway`] - Façade, read path, write fan-out and forward set
//! - [`net`] - Header codec, TCP connections, socket pool and peer server
//! - [`placement`] - Virtual-node ring and cluster snapshots

use std::time::Duration;

pub mod adapters;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod net;
pub mod placement;

// Re-export commonly used types
pub use domain::{NodeId, ObjectId, Request, RequestHeader, ResultCode};
pub use error::{Error, Result};
pub use gateway::{Gateway, GatewayConfig};
pub use placement::{ClusterView, PlacementTable};

// =============================================================================
// Cluster Limits
// =============================================================================

/// Upper bound on copies of one object
pub const MAX_COPIES: usize = 31;

/// Upper bound on nodes in one cluster
pub const MAX_NODES: usize = 6144;

/// Virtual nodes per physical node unless configured otherwise
pub const DEFAULT_VNODES: u16 = 128;

/// Copies per object when neither request nor VDI names a count
pub const DEFAULT_COPIES: u8 = 3;

/// Retries after a timeout while the epoch is unchanged
pub const MAX_RETRY_COUNT: u32 = 5;

/// Largest payload read off the wire or held in one stored object
pub const MAX_PAYLOAD_SIZE: usize = 64 << 20;

/// Bounded wait of one readiness poll
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Returns the crate version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
