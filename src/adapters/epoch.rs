//! Cluster epoch tracker.

use std::sync::atomic::{AtomicU32, Ordering};

use tracing::info;

use crate::domain::{Epoch, EpochPolicy};

/// Holds the epoch this node currently believes in.
///
/// A stalled operation may keep waiting only while the cluster is still at
/// the epoch the operation started in.
#[derive(Debug, Default)]
pub struct EpochTracker {
    current: AtomicU32,
}

impl EpochTracker {
    pub fn new(epoch: Epoch) -> Self {
        Self {
            current: AtomicU32::new(epoch),
        }
    }

    pub fn current(&self) -> Epoch {
        self.current.load(Ordering::Acquire)
    }

    pub fn set(&self, epoch: Epoch) {
        let old = self.current.swap(epoch, Ordering::AcqRel);
        if old != epoch {
            info!(old, new = epoch, "Epoch changed");
        }
    }

    /// Move to the next epoch and return it.
    pub fn advance(&self) -> Epoch {
        let next = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        info!(new = next, "Epoch advanced");
        next
    }
}

impl EpochPolicy for EpochTracker {
    fn need_retry(&self, epoch: Epoch) -> bool {
        self.current() == epoch
    }
}
