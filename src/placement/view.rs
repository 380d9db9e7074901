//! Versioned cluster snapshot handed to each request.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::ring::{PlacementEntry, PlacementTable};
use crate::domain::{Epoch, ObjectId, VdiId};
use crate::error::Result;

/// Read-only view of placement state at one epoch.
///
/// A request holds an `Arc<ClusterView>` for its whole lifetime, so every
/// placement it computes comes from one snapshot even if membership moves
/// on meanwhile.
#[derive(Debug, Clone, Default)]
pub struct ClusterView {
    epoch: Epoch,
    table: Arc<PlacementTable>,
    vdi_copies: HashMap<VdiId, u8>,
    snapshot_vdis: HashSet<VdiId>,
}

impl ClusterView {
    pub fn new(epoch: Epoch, table: PlacementTable) -> Self {
        Self {
            epoch,
            table: Arc::new(table),
            vdi_copies: HashMap::new(),
            snapshot_vdis: HashSet::new(),
        }
    }

    /// View with no nodes; every resolve fails.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Record the copy count a VDI was created with.
    pub fn with_vdi_copies(mut self, vid: VdiId, copies: u8) -> Self {
        self.vdi_copies.insert(vid, copies);
        self
    }

    /// Mark a VDI as a snapshot; its data objects become read-only.
    pub fn with_snapshot(mut self, vid: VdiId) -> Self {
        self.snapshot_vdis.insert(vid);
        self
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn table(&self) -> &PlacementTable {
        &self.table
    }

    pub fn vdi_copies(&self, vid: VdiId) -> Option<u8> {
        self.vdi_copies.get(&vid).copied()
    }

    /// Data objects of snapshot VDIs may not be written.
    pub fn is_readonly(&self, oid: ObjectId) -> bool {
        oid.is_data() && self.snapshot_vdis.contains(&oid.vid())
    }

    pub fn resolve(&self, oid: ObjectId, copies: usize, max_copies: usize) -> Result<Vec<PlacementEntry>> {
        self.table.resolve_with_limit(oid, copies, max_copies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readonly_only_for_snapshot_data_objects() {
        let view = ClusterView::empty().with_snapshot(5);

        assert!(view.is_readonly(ObjectId::data(5, 0)));
        assert!(!view.is_readonly(ObjectId::data(6, 0)));
        assert!(!view.is_readonly(ObjectId::vdi(5)));
    }

    #[test]
    fn test_vdi_copies() {
        let view = ClusterView::empty().with_vdi_copies(5, 2);
        assert_eq!(view.vdi_copies(5), Some(2));
        assert_eq!(view.vdi_copies(6), None);
    }
}
