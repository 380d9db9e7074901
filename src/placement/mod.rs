//! Placement Resolver
//!
//! Maps an object id and a replica count to an ordered list of virtual
//! nodes and their owning physical nodes.
//!
//! ```text
//!                  hash_oid(oid)
//!                       │
//!        ┌──────────────▼───────────────────────────────┐
//!  ring: │ v(A,z0) v(C,z2) v(A,z0) v(B,z1) v(D,z2) ...   │  (sorted by hash)
//!        └──────────────┬───────────────────────────────┘
//!                       │ walk clockwise, one copy per zone
//!                       ▼
//!               [C(z2), A(z0), B(z1)]
//! ```
//!
//! The mapping is a pure function of the snapshot, so every node computes
//! it independently and writers and readers agree on replica locations
//! without a directory service.

pub mod hash;
mod proptest;
mod ring;
mod view;

pub use ring::{PlacementEntry, PlacementTable, Vnode};
pub use view::ClusterView;
