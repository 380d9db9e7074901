//! Virtual-node ring and the placement walk.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use super::hash::{hash_bytes, hash_next, hash_oid};
use crate::domain::{Node, NodeId, ObjectId};
use crate::error::{Error, Result};
use crate::{MAX_COPIES, MAX_NODES};

/// One ring position owned by a physical node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Vnode {
    pub hash: u64,
    pub node: Node,
}

/// One copy of an object: the ring position that selected it and the
/// node that stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlacementEntry {
    pub vnode: u64,
    pub node: Node,
}

impl PlacementEntry {
    pub fn node_id(&self) -> &NodeId {
        &self.node.id
    }

    pub fn is_local(&self, local: &NodeId) -> bool {
        self.node.id == *local
    }
}

/// Immutable consistent-hashing table built from a node list.
///
/// Independent of the order nodes were supplied in: two nodes building a
/// table from the same membership resolve every object identically.
#[derive(Debug, Clone, Default)]
pub struct PlacementTable {
    vnodes: Vec<Vnode>,
    nodes: Vec<Node>,
    nr_zones: usize,
}

impl PlacementTable {
    /// Build a table bounded by [`MAX_NODES`].
    pub fn build(nodes: impl IntoIterator<Item = Node>) -> Result<Self> {
        Self::build_with_limit(nodes, MAX_NODES)
    }

    pub fn build_with_limit(nodes: impl IntoIterator<Item = Node>, max_nodes: usize) -> Result<Self> {
        let mut nodes: Vec<Node> = nodes.into_iter().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes.dedup_by(|a, b| a.id == b.id);

        if nodes.len() > max_nodes {
            return Err(Error::TooManyNodes {
                count: nodes.len(),
                max: max_nodes,
            });
        }

        let total: usize = nodes.iter().map(|n| n.nr_vnodes as usize).sum();
        let mut vnodes = Vec::with_capacity(total);
        for node in &nodes {
            let mut hval = hash_bytes(&node.id.hash_bytes());
            for _ in 0..node.nr_vnodes {
                hval = hash_next(hval);
                vnodes.push(Vnode { hash: hval, node: *node });
            }
        }
        vnodes.sort_by(|a, b| a.hash.cmp(&b.hash).then(a.node.id.cmp(&b.node.id)));

        // A node without vnodes never appears on the ring, so its zone
        // cannot hold a copy.
        let nr_zones = nodes
            .iter()
            .filter(|n| n.nr_vnodes > 0)
            .map(|n| n.zone)
            .collect::<BTreeSet<_>>()
            .len();

        debug!(
            nodes = nodes.len(),
            vnodes = vnodes.len(),
            zones = nr_zones,
            "Built placement table"
        );

        Ok(Self {
            vnodes,
            nodes,
            nr_zones,
        })
    }

    /// Resolve `copies` placements for `oid`, bounded by [`MAX_COPIES`].
    pub fn resolve(&self, oid: ObjectId, copies: usize) -> Result<Vec<PlacementEntry>> {
        self.resolve_with_limit(oid, copies, MAX_COPIES)
    }

    /// Walk the ring clockwise from the object's position, taking the first
    /// vnode of each zone not yet holding a copy.
    pub fn resolve_with_limit(
        &self,
        oid: ObjectId,
        copies: usize,
        max_copies: usize,
    ) -> Result<Vec<PlacementEntry>> {
        if copies == 0 {
            return Err(Error::InvalidCopies(copies));
        }
        if copies > max_copies {
            return Err(Error::TooManyCopies {
                requested: copies,
                max: max_copies,
            });
        }
        if copies > self.nr_zones {
            return Err(Error::InsufficientZones {
                requested: copies,
                available: self.nr_zones,
            });
        }

        let hval = hash_oid(oid);
        let start = self.vnodes.partition_point(|v| v.hash < hval);
        let len = self.vnodes.len();

        let mut entries: Vec<PlacementEntry> = Vec::with_capacity(copies);
        for i in 0..len {
            let vnode = &self.vnodes[(start + i) % len];
            if entries.iter().any(|e| e.node.zone == vnode.node.zone) {
                continue;
            }
            entries.push(PlacementEntry {
                vnode: vnode.hash,
                node: vnode.node,
            });
            if entries.len() == copies {
                break;
            }
        }

        if entries.len() < copies {
            return Err(Error::InsufficientZones {
                requested: copies,
                available: entries.len(),
            });
        }
        Ok(entries)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn vnodes(&self) -> &[Vnode] {
        &self.vnodes
    }

    pub fn nr_zones(&self) -> usize {
        self.nr_zones
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
