//! Domain Layer
//!
//! Value objects, request envelopes and the ports the gateway consumes.
//!
//! - **Types** (`types.rs`) - object ids, node ids, epochs
//! - **Result** (`result.rs`) - caller-visible result codes
//! - **Request** (`request.rs`) - headers, opcodes, request/reply envelopes
//! - **Ports** (`ports.rs`) - trait abstractions for external collaborators
//!
//! # Usage
//!
//! ```ignore
//! use replica_gateway::domain::{EpochPolicy, Epoch};
//!
//! struct FixedEpoch(Epoch);
//!
//! impl EpochPolicy for FixedEpoch {
//!     fn need_retry(&self, epoch: Epoch) -> bool {
//!         epoch == self.0
//!     }
//! }
//! ```

pub mod ports;
pub mod request;
pub mod result;
pub mod types;

pub use ports::{
    ConnectionLease, EpochPolicy, LocalStore, ObjectCache, PeerConnection, PeerExecutor,
    Readiness,
};
pub use request::{
    flags, Opcode, PeerReply, Request, RequestHeader, ResponseHeader, PEER_PROTO_VER, PROTO_VER,
};
pub use result::{Outcome, ResultCode};
pub use types::{Epoch, Node, NodeId, ObjectId, VdiId};
