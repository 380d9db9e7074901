//! Forward-Set Tracker
//!
//! In-flight forwards of one write fan-out, one per issued replica.

use crate::domain::NodeId;
use crate::error::Error;

/// One issued forward awaiting its response.
#[derive(Debug)]
pub struct ForwardEntry<C> {
    pub node: NodeId,
    pub conn: C,
}

/// Ordered set of outstanding forwards.
///
/// Entries leave only through [`ForwardSet::remove`], which keeps the
/// relative order of the rest, so position `i` of the next readiness scan
/// always names the `i`-th surviving forward.
#[derive(Debug)]
pub struct ForwardSet<C> {
    entries: Vec<ForwardEntry<C>>,
    capacity: usize,
}

impl<C> ForwardSet<C> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Track a newly issued forward.
    ///
    /// A full set hands the entry back so its connection can still be
    /// released or invalidated.
    pub fn push(&mut self, node: NodeId, conn: C) -> Result<(), ForwardEntry<C>> {
        let entry = ForwardEntry { node, conn };
        if self.entries.len() >= self.capacity {
            return Err(entry);
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Error describing a rejected push.
    pub fn full_error(&self) -> Error {
        Error::ForwardSetFull {
            capacity: self.capacity,
        }
    }

    /// Remove the entry at `pos`, shifting later entries down by one.
    pub fn remove(&mut self, pos: usize) -> ForwardEntry<C> {
        self.entries.remove(pos)
    }

    /// Remove every entry, in order.
    pub fn drain(&mut self) -> std::vec::Drain<'_, ForwardEntry<C>> {
        self.entries.drain(..)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ForwardEntry<C>> {
        self.entries.iter()
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        self.entries.iter().map(|e| e.node).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
