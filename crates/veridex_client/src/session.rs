//! A verifying client session.
//!
//! Wraps the consistency engine with the collaborators a running client
//! wires in: structured logging of check outcomes, snapshot retention, and
//! forwarding of accepted epochs to an audit sink.

use tracing::{info, warn};
use veridex_merkle::SignedTreeRoot;
use veridex_primitives::Pk32;
use veridex_protocol::audit::{audit_digest, AuditSink};
use veridex_protocol::{ConsistencyChecks, ErrorCode, RequestType, Response, SetupError, VrfVerifier};

use crate::store::SnapshotStore;

/// One client's verified view of one directory.
pub struct ClientSession<V> {
    checks: ConsistencyChecks,
    vrf: V,
    store: Option<Box<dyn SnapshotStore>>,
    audit: Option<Box<dyn AuditSink>>,
}

impl<V: VrfVerifier> ClientSession<V> {
    /// Create a session with an optionally pinned snapshot and the pinned
    /// directory signing key.
    pub fn new(
        pinned_str: Option<SignedTreeRoot>,
        sign_pk: Pk32,
        vrf: V,
    ) -> Result<Self, SetupError> {
        Ok(Self {
            checks: ConsistencyChecks::new(pinned_str, true, sign_pk)?,
            vrf,
            store: None,
            audit: None,
        })
    }

    /// Retain every accepted snapshot in `store`.
    #[must_use]
    pub fn with_store(mut self, store: Box<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Forward `(epoch, digest)` of newly accepted snapshots to `sink`.
    #[must_use]
    pub fn with_audit(mut self, sink: Box<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// The underlying trust state.
    #[must_use]
    pub fn checks(&self) -> &ConsistencyChecks {
        &self.checks
    }

    /// Verify a registration response for `name`.
    pub fn register(&mut self, msg: &Response, name: &str, key: Option<&[u8]>) -> ErrorCode {
        self.dispatch(RequestType::Registration, msg, name, key)
    }

    /// Verify a lookup response for `name`.
    pub fn lookup(&mut self, msg: &Response, name: &str, key: Option<&[u8]>) -> ErrorCode {
        self.dispatch(RequestType::KeyLookup, msg, name, key)
    }

    /// Verify a monitoring response for `name`.
    pub fn monitor(&mut self, msg: &Response, name: &str, key: Option<&[u8]>) -> ErrorCode {
        self.dispatch(RequestType::Monitoring, msg, name, key)
    }

    fn dispatch(
        &mut self,
        request_type: RequestType,
        msg: &Response,
        name: &str,
        key: Option<&[u8]>,
    ) -> ErrorCode {
        let before = self.checks.trusted_str().map(|s| s.epoch);
        let code = self
            .checks
            .handle_response(request_type, msg, name, key, &self.vrf);
        let after = self.checks.trusted_str().map(|s| s.epoch);

        if code == ErrorCode::Passed {
            info!(name, request = ?request_type, epoch = ?after, "consistency checks passed");
        } else {
            warn!(name, request = ?request_type, code = %code, "response failed verification");
        }

        // A newly accepted snapshot is worth keeping even when the inner
        // proof failed; it is non-equivocation evidence either way.
        if after != before {
            if let Some(snapshot) = self.checks.trusted_str() {
                if let Some(store) = self.store.as_mut() {
                    store.store(snapshot);
                }
                if let Some(sink) = self.audit.as_mut() {
                    sink.publish(snapshot.epoch, audit_digest(snapshot));
                }
            }
        }
        code
    }
}
