//! One-way audit seam: newly accepted snapshots are summarized as
//! `(epoch, digest)` pairs for external anchoring. The consistency engine has
//! no dependency on this; callers forward after a response is handled.

use veridex_merkle::SignedTreeRoot;
use veridex_primitives::{constants, h_tag, Hash256};

/// Receives one digest per newly accepted epoch.
pub trait AuditSink {
    fn publish(&mut self, epoch: u64, digest: Hash256);
}

/// Digest forwarded to auditors: a tagged hash of the snapshot signature.
#[must_use]
pub fn audit_digest(snapshot: &SignedTreeRoot) -> Hash256 {
    h_tag(constants::TAG_AUDIT, &[&snapshot.signature])
}

/// In-memory sink for tests and local inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub published: Vec<(u64, Hash256)>,
}

impl AuditSink for RecordingSink {
    fn publish(&mut self, epoch: u64, digest: Hash256) {
        self.published.push((epoch, digest));
    }
}
