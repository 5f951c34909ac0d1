//! Snapshot storage seam.
//!
//! The verifier only ever needs the latest trusted root, but clients may want
//! to retain the full chain they have seen (for audits, or to answer
//! prior-history monitoring locally). The store implementation is chosen at
//! construction; there is no runtime registry.

use std::collections::BTreeMap;

use veridex_merkle::SignedTreeRoot;

/// Receives every newly accepted snapshot.
pub trait SnapshotStore {
    fn store(&mut self, snapshot: &SignedTreeRoot);
}

/// Keeps accepted snapshots in memory, keyed by epoch.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: BTreeMap<u64, SignedTreeRoot>,
}

impl MemorySnapshotStore {
    #[must_use]
    pub fn get(&self, epoch: u64) -> Option<&SignedTreeRoot> {
        self.snapshots.get(&epoch)
    }

    #[must_use]
    pub fn latest(&self) -> Option<&SignedTreeRoot> {
        self.snapshots.values().next_back()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn store(&mut self, snapshot: &SignedTreeRoot) {
        self.snapshots.insert(snapshot.epoch, snapshot.clone());
    }
}
