//! Infrastructure Adapters
//!
//! Implementations of the domain ports that are not network transports
//! (those live in [`crate::net`]).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │  LocalStore │ EpochPolicy │ ObjectCache │ ConnectionLease   │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ InMemoryLocalStore │ EpochTracker │ DisabledObjectCache    │ │
//! │  │ ScriptedLease │ ScriptedPeers │ ScriptedStore (testing)    │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use replica_gateway::adapters::{EpochTracker, InMemoryLocalStore};
//! use replica_gateway::domain::EpochPolicy;
//!
//! let epochs = EpochTracker::new(1);
//! assert!(epochs.need_retry(1));
//! ```

mod cache;
mod epoch;
mod memory_store;
pub mod scripted;

pub use cache::DisabledObjectCache;
pub use epoch::EpochTracker;
pub use memory_store::{InMemoryLocalStore, StoreStats};
pub use scripted::{
    LeaseEvent, NodeScript, PeerScript, RecordingCache, ScriptedConnection, ScriptedLease,
    ScriptedPeers, ScriptedStore,
};
