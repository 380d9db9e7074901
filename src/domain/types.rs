//! Value objects shared by every layer of the gateway.

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Cluster membership version.
pub type Epoch = u32;

/// Virtual disk identifier, 24 bits wide.
pub type VdiId = u32;

// =============================================================================
// Object Identifier
// =============================================================================

/// Opaque 64-bit identifier of a logical object.
///
/// The top bits classify the object; bits 32..56 hold the owning VDI.
///
/// ```text
///  63   62   61        56               32                      0
/// ┌────┬────┬────┬─────┬─────────────────┬───────────────────────┐
/// │VDI │VMST│ATTR│ rsv │     VDI id      │   index / attr slot   │
/// └────┴────┴────┴─────┴─────────────────┴───────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// Inode object of a VDI
    pub const VDI_BIT: u64 = 1 << 63;
    /// VM state object
    pub const VMSTATE_BIT: u64 = 1 << 62;
    /// VDI attribute object
    pub const VDI_ATTR_BIT: u64 = 1 << 61;

    const VDI_SPACE_SHIFT: u32 = 32;
    const VDI_ID_MASK: u64 = 0x00ff_ffff;

    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Data object `index` of VDI `vid`.
    pub fn data(vid: VdiId, index: u32) -> Self {
        Self(((vid as u64 & Self::VDI_ID_MASK) << Self::VDI_SPACE_SHIFT) | index as u64)
    }

    /// Inode object of VDI `vid`.
    pub fn vdi(vid: VdiId) -> Self {
        Self(Self::VDI_BIT | ((vid as u64 & Self::VDI_ID_MASK) << Self::VDI_SPACE_SHIFT))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn vid(&self) -> VdiId {
        ((self.0 >> Self::VDI_SPACE_SHIFT) & Self::VDI_ID_MASK) as VdiId
    }

    pub fn is_vdi(&self) -> bool {
        self.0 & Self::VDI_BIT != 0
    }

    pub fn is_vmstate(&self) -> bool {
        self.0 & Self::VMSTATE_BIT != 0
    }

    pub fn is_vdi_attr(&self) -> bool {
        self.0 & Self::VDI_ATTR_BIT != 0
    }

    /// True for plain data objects (not inode, vmstate or attribute).
    pub fn is_data(&self) -> bool {
        self.0 & (Self::VDI_BIT | Self::VMSTATE_BIT | Self::VDI_ATTR_BIT) == 0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<u64> for ObjectId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

// =============================================================================
// Node Identity
// =============================================================================

/// Network identity of a physical node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub SocketAddr);

impl NodeId {
    pub fn new(addr: SocketAddr) -> Self {
        Self(addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.0
    }

    /// Stable byte form used for ring hashing: IPv6-mapped address then port.
    pub fn hash_bytes(&self) -> [u8; 18] {
        let mut out = [0u8; 18];
        let ip = match self.0.ip() {
            std::net::IpAddr::V4(v4) => v4.to_ipv6_mapped(),
            std::net::IpAddr::V6(v6) => v6,
        };
        out[..16].copy_from_slice(&ip.octets());
        out[16..].copy_from_slice(&self.0.port().to_be_bytes());
        out
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SocketAddr> for NodeId {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

/// A physical node as seen by the placement table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Failure zone; no two copies of an object share a zone
    pub zone: u32,
    /// Number of ring positions owned by this node
    pub nr_vnodes: u16,
}

impl Node {
    pub fn new(id: NodeId, zone: u32) -> Self {
        Self {
            id,
            zone,
            nr_vnodes: crate::DEFAULT_VNODES,
        }
    }

    pub fn with_vnodes(mut self, nr_vnodes: u16) -> Self {
        self.nr_vnodes = nr_vnodes;
        self
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_classification() {
        let data = ObjectId::data(0x00ab_cdef, 7);
        assert!(data.is_data());
        assert!(!data.is_vdi());
        assert_eq!(data.vid(), 0x00ab_cdef);

        let inode = ObjectId::vdi(0x42);
        assert!(inode.is_vdi());
        assert!(!inode.is_data());
        assert_eq!(inode.vid(), 0x42);

        let vmstate = ObjectId::new(ObjectId::VMSTATE_BIT | 1);
        assert!(vmstate.is_vmstate());
        assert!(!vmstate.is_data());
    }

    #[test]
    fn test_object_id_display() {
        assert_eq!(ObjectId::new(0xdead).to_string(), "000000000000dead");
    }

    #[test]
    fn test_node_hash_bytes_stable_across_ip_forms() {
        let v4 = NodeId::new("10.0.0.1:7000".parse().unwrap());
        let mapped = NodeId::new("[::ffff:10.0.0.1]:7000".parse().unwrap());
        assert_eq!(v4.hash_bytes(), mapped.hash_bytes());

        let other_port = NodeId::new("10.0.0.1:7001".parse().unwrap());
        assert_ne!(v4.hash_bytes(), other_port.hash_bytes());
    }
}
