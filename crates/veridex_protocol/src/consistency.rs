//! The consistency-checks engine.
//!
//! One instance accumulates a client's trust state: the latest accepted
//! signed tree root, every verified name-to-key binding, outstanding
//! registration promises, and per-name registration epochs. Each directory
//! response is pushed through [`ConsistencyChecks::handle_response`], which
//! verifies it and folds it into that state.
//!
//! The snapshot update is kept even when a later check fails: a response
//! carrying a verifiable snapshot is non-equivocation evidence regardless of
//! the proof under it. Bindings and promises are only committed on full
//! success.

use std::collections::BTreeMap;

use thiserror::Error;
use veridex_merkle::{lookup_index, AuthenticationPath, PathError, ProofType, SignedTreeRoot};
use veridex_primitives::Pk32;

use crate::promise::TemporaryBinding;
use crate::{
    verify_sig, DirectoryProof, DirectoryProofs, DirectoryResponse, ErrorCode, RequestType,
    Response, VrfVerifier,
};

/// Construction failures.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The directory protocol currently requires temporary bindings; a
    /// verifier without them cannot check registrations.
    #[error("temporary bindings are required by the current directory protocol")]
    PromisesRequired,
}

/// Everything the verifier tracks about one name.
#[derive(Clone, Debug, Default)]
struct NameRecord {
    /// Last accepted key bytes; `None` until a proof has passed.
    key: Option<Vec<u8>>,
    /// Epoch at which a registration promise or inclusion was first observed.
    /// Kept after the promise is retired; monitoring classification needs it.
    reg_epoch: Option<u64>,
    /// Outstanding registration promise, if any.
    tb: Option<TemporaryBinding>,
}

/// Client-side trust state plus the verification logic over it.
///
/// Create one instance per logical client at registration time; feed it every
/// subsequent response from the same directory. The engine is synchronous and
/// single-threaded; callers needing concurrency serialize externally.
pub struct ConsistencyChecks {
    trusted: Option<SignedTreeRoot>,
    names: BTreeMap<String, NameRecord>,
    /// Pinned directory signing key, immutable for the verifier's lifetime.
    sign_pk: Pk32,
}

impl ConsistencyChecks {
    /// Create the verifier, optionally pinning a known snapshot (e.g. the
    /// genesis root distributed out of band).
    pub fn new(
        pinned_str: Option<SignedTreeRoot>,
        use_tbs: bool,
        sign_pk: Pk32,
    ) -> Result<Self, SetupError> {
        if !use_tbs {
            return Err(SetupError::PromisesRequired);
        }
        Ok(Self {
            trusted: pinned_str,
            names: BTreeMap::new(),
            sign_pk,
        })
    }

    /// The latest accepted signed tree root.
    #[must_use]
    pub const fn trusted_str(&self) -> Option<&SignedTreeRoot> {
        self.trusted.as_ref()
    }

    /// Last accepted key for `name`, if a proof for it has passed.
    #[must_use]
    pub fn binding(&self, name: &str) -> Option<&[u8]> {
        self.names.get(name)?.key.as_deref()
    }

    /// Epoch at which `name`'s registration promise was observed.
    #[must_use]
    pub fn reg_epoch(&self, name: &str) -> Option<u64> {
        self.names.get(name)?.reg_epoch
    }

    /// Outstanding registration promise for `name`, if any.
    #[must_use]
    pub fn temporary_binding(&self, name: &str) -> Option<&TemporaryBinding> {
        self.names.get(name)?.tb.as_ref()
    }

    /// Verify the directory's response to a request about `name`.
    ///
    /// `key` is the key the caller expects for `name`; `None` means the
    /// caller has no prior record and accepts the received key (trust on
    /// first use).
    ///
    /// Returns [`ErrorCode::Passed`] when every check succeeds; any other
    /// code identifies the first check that failed. Directory-signalled
    /// errors are returned unchanged without touching the state.
    pub fn handle_response(
        &mut self,
        request_type: RequestType,
        msg: &Response,
        name: &str,
        key: Option<&[u8]>,
        vrf: &impl VrfVerifier,
    ) -> ErrorCode {
        if msg.error.is_directory_error() {
            return msg.error;
        }
        if let Err(code) = check_shape(request_type, msg) {
            return code;
        }
        if let Err(code) = self.update_str(request_type, msg) {
            return code;
        }
        if let Err(code) = self.check_consistency(request_type, msg, name, key, vrf) {
            return code;
        }
        if let Err(code) = self.update_tbs(request_type, msg, name, key) {
            return code;
        }
        let received = msg.received_key().map(<[u8]>::to_vec);
        self.names.entry(name.to_owned()).or_default().key = received;
        ErrorCode::Passed
    }

    fn trusted_epoch(&self) -> u64 {
        self.trusted
            .as_ref()
            .expect("snapshot must be trusted before this point")
            .epoch
    }

    // ——— Step 3: snapshot update ———————————————————————————————————————

    fn update_str(&mut self, request_type: RequestType, msg: &Response) -> Result<(), ErrorCode> {
        match request_type {
            RequestType::Registration | RequestType::KeyLookup => {
                let incoming = &single_proof(msg).str;
                let Some(saved) = &self.trusted else {
                    // First response ever: adopt the snapshot as initial trust.
                    self.trusted = Some(incoming.clone());
                    return Ok(());
                };
                // A re-served epoch must be bit-equal to what we trust.
                if verify_same(saved, incoming).is_ok() {
                    return Ok(());
                }
                // Otherwise the directory must have entered the next epoch.
                verify_successor(saved, incoming, &self.sign_pk)?;
                self.trusted = Some(incoming.clone());
                Ok(())
            }
            RequestType::Monitoring => {
                let strs = &batch_proofs(msg).strs;
                let saved = self
                    .trusted
                    .as_ref()
                    .expect("monitoring requires an already trusted snapshot");
                let saved_epoch = saved.epoch;
                let first = &strs[0];
                match first.epoch {
                    e if e < saved_epoch => {
                        // Prior-history window, accepted as served.
                        // TODO: re-verify historical roots once an auditor
                        // attestation seam exists.
                    }
                    e if e == saved_epoch => verify_same(saved, first)?,
                    e if e == saved_epoch + 1 => verify_successor(saved, first, &self.sign_pk)?,
                    _ => panic!("monitoring snapshots skip past the trusted epoch"),
                }
                for i in 1..strs.len() {
                    verify_successor(&strs[i - 1], &strs[i], &self.sign_pk)?;
                }
                if let Some(last) = strs.last() {
                    if last.epoch > saved_epoch {
                        self.trusted = Some(last.clone());
                    }
                }
                Ok(())
            }
        }
    }

    // ——— Step 4: per-request proof classification ———————————————————————

    fn check_consistency(
        &self,
        request_type: RequestType,
        msg: &Response,
        name: &str,
        key: Option<&[u8]>,
        vrf: &impl VrfVerifier,
    ) -> Result<(), ErrorCode> {
        match request_type {
            RequestType::Registration => self.verify_registration(msg, name, key, vrf),
            RequestType::KeyLookup => self.verify_key_lookup(msg, name, key, vrf),
            RequestType::Monitoring => self.verify_monitoring(msg, name, key, vrf),
        }
    }

    fn verify_registration(
        &self,
        msg: &Response,
        name: &str,
        key: Option<&[u8]>,
        vrf: &impl VrfVerifier,
    ) -> Result<(), ErrorCode> {
        let df = single_proof(msg);
        match (msg.error, df.ap.proof_type()) {
            (ErrorCode::NameExisted, ProofType::Inclusion | ProofType::Absence)
            | (ErrorCode::Success, ProofType::Absence) => {}
            _ => return Err(ErrorCode::MalformedMessage),
        }
        verify_auth_path(name, key, &df.ap, &df.str, vrf)
    }

    fn verify_key_lookup(
        &self,
        msg: &Response,
        name: &str,
        key: Option<&[u8]>,
        vrf: &impl VrfVerifier,
    ) -> Result<(), ErrorCode> {
        let df = single_proof(msg);
        // Key changes are unsupported: an inclusion is only ever compared
        // against the one expected key.
        match (msg.error, df.ap.proof_type()) {
            (ErrorCode::NameNotFound, ProofType::Absence)
            | (ErrorCode::Success, ProofType::Inclusion | ProofType::Absence) => {}
            _ => return Err(ErrorCode::MalformedMessage),
        }
        verify_auth_path(name, key, &df.ap, &df.str, vrf)
    }

    fn verify_monitoring(
        &self,
        msg: &Response,
        name: &str,
        key: Option<&[u8]>,
        vrf: &impl VrfVerifier,
    ) -> Result<(), ErrorCode> {
        let dfs = batch_proofs(msg);
        let reg = self.reg_epoch(name);
        let first_str = &dfs.strs[0];
        let first_ap = &dfs.aps[0];
        let was_absent = first_ap.proof_type() == ProofType::Absence;

        // The window's first entry must open at an epoch consistent with what
        // we know about the name: absent before and at its registration
        // epoch, included afterwards. Unregistered names are only ever
        // monitored through prior history.
        let admissible = match reg {
            None => was_absent && first_str.epoch < self.trusted_epoch(),
            Some(r) if was_absent => first_str.epoch <= r,
            Some(r) => first_str.epoch > r,
        };
        if !admissible {
            return Err(ErrorCode::BadAuthPath);
        }
        verify_auth_path(name, key, first_ap, first_str, vrf)?;

        for i in 1..dfs.strs.len() {
            let entry = &dfs.strs[i];
            let ap = &dfs.aps[i];
            let want_inclusion = reg.is_some_and(|r| entry.epoch > r);
            if (ap.proof_type() == ProofType::Inclusion) != want_inclusion {
                return Err(ErrorCode::BadAuthPath);
            }
            verify_auth_path(name, key, ap, entry, vrf)?;
        }
        Ok(())
    }

    // ——— Step 5: promise reconciliation —————————————————————————————————

    fn update_tbs(
        &mut self,
        request_type: RequestType,
        msg: &Response,
        name: &str,
        key: Option<&[u8]>,
    ) -> Result<(), ErrorCode> {
        match request_type {
            RequestType::Registration => {
                let df = single_proof(msg);
                if df.ap.proof_type() == ProofType::Absence {
                    self.verify_returned_promise(df, key)?;
                    self.record_promise(name, df);
                }
                Ok(())
            }
            RequestType::KeyLookup => {
                let df = single_proof(msg);
                match (msg.error, df.ap.proof_type()) {
                    (ErrorCode::Success, ProofType::Inclusion) => {
                        // The epoch after registration must show the promised
                        // binding; any other inclusion there is a broken
                        // promise.
                        if self.reg_epoch(name).is_some_and(|r| df.str.epoch == r + 1) {
                            self.verify_fulfilled_promise(name, &df.ap)?;
                            self.retire_promise(name);
                        }
                        Ok(())
                    }
                    (ErrorCode::Success, ProofType::Absence) => {
                        self.verify_returned_promise(df, key)?;
                        self.record_promise(name, df);
                        Ok(())
                    }
                    _ => Ok(()),
                }
            }
            RequestType::Monitoring => {
                let dfs = batch_proofs(msg);
                if self
                    .reg_epoch(name)
                    .is_some_and(|r| dfs.strs[0].epoch == r + 1)
                {
                    self.verify_fulfilled_promise(name, &dfs.aps[0])?;
                    self.retire_promise(name);
                }
                Ok(())
            }
        }
    }

    /// Validate a promise returned with a proof of absence.
    fn verify_returned_promise(
        &self,
        df: &DirectoryProof,
        key: Option<&[u8]>,
    ) -> Result<(), ErrorCode> {
        let Some(tb) = &df.tb else {
            return Err(ErrorCode::BadPromise);
        };
        if !verify_sig(
            &self.sign_pk,
            &tb.signing_message(&df.str.signature),
            &tb.signature,
        ) {
            return Err(ErrorCode::BadSignature);
        }
        if tb.index != df.ap.lookup_index {
            return Err(ErrorCode::BadPromise);
        }
        // `key` is None when the caller has no record of the binding (TOFU).
        if let Some(expected) = key {
            if tb.value != expected {
                return Err(ErrorCode::BindingsDiffer);
            }
        }
        Ok(())
    }

    /// Check that a held promise was inserted as promised.
    fn verify_fulfilled_promise(
        &self,
        name: &str,
        ap: &AuthenticationPath,
    ) -> Result<(), ErrorCode> {
        if let Some(tb) = self.temporary_binding(name) {
            if ap.lookup_index != tb.index || ap.leaf.value != tb.value {
                return Err(ErrorCode::BrokenPromise);
            }
        }
        Ok(())
    }

    fn record_promise(&mut self, name: &str, df: &DirectoryProof) {
        let epoch = self.trusted_epoch();
        let rec = self.names.entry(name.to_owned()).or_default();
        rec.tb = df.tb.clone();
        rec.reg_epoch = Some(epoch);
    }

    fn retire_promise(&mut self, name: &str) {
        if let Some(rec) = self.names.get_mut(name) {
            rec.tb = None;
        }
    }
}

// ——— Step 2: response shape —————————————————————————————————————————————

fn check_shape(request_type: RequestType, msg: &Response) -> Result<(), ErrorCode> {
    match request_type {
        RequestType::Registration | RequestType::KeyLookup => match &msg.res {
            Some(DirectoryResponse::Proof(_)) => Ok(()),
            _ => Err(ErrorCode::MalformedMessage),
        },
        RequestType::Monitoring => {
            if msg.error != ErrorCode::Success {
                return Err(ErrorCode::MalformedMessage);
            }
            match &msg.res {
                Some(DirectoryResponse::Proofs(dfs))
                    if !dfs.aps.is_empty() && dfs.aps.len() == dfs.strs.len() =>
                {
                    Ok(())
                }
                _ => Err(ErrorCode::MalformedMessage),
            }
        }
    }
}

fn single_proof(msg: &Response) -> &DirectoryProof {
    match &msg.res {
        Some(DirectoryResponse::Proof(df)) => df,
        _ => unreachable!("response shape validated before dispatch"),
    }
}

fn batch_proofs(msg: &Response) -> &DirectoryProofs {
    match &msg.res {
        Some(DirectoryResponse::Proofs(dfs)) => dfs,
        _ => unreachable!("response shape validated before dispatch"),
    }
}

// ——— Snapshot predicates ————————————————————————————————————————————————

/// Equal-epoch check: the snapshot must be bit-equal to the one we trust.
pub fn verify_same(saved: &SignedTreeRoot, incoming: &SignedTreeRoot) -> Result<(), ErrorCode> {
    if saved == incoming {
        Ok(())
    } else {
        Err(ErrorCode::BadStr)
    }
}

/// Successor check: signature under the pinned key, then the hash-chain
/// pointer back to the saved snapshot.
pub fn verify_successor(
    saved: &SignedTreeRoot,
    incoming: &SignedTreeRoot,
    sign_pk: &Pk32,
) -> Result<(), ErrorCode> {
    if !verify_sig(sign_pk, &incoming.serialize(), &incoming.signature) {
        return Err(ErrorCode::BadSignature);
    }
    if incoming.verify_hash_chain(saved) {
        Ok(())
    } else {
        Err(ErrorCode::BadStr)
    }
}

// ——— Path verification ——————————————————————————————————————————————————

/// Verify one authentication path against one snapshot: VRF index first,
/// then the tree-level checks, mapped onto protocol codes.
fn verify_auth_path(
    name: &str,
    key: Option<&[u8]>,
    ap: &AuthenticationPath,
    snapshot: &SignedTreeRoot,
    vrf: &impl VrfVerifier,
) -> Result<(), ErrorCode> {
    let Some(beta) = vrf.verify(&snapshot.policies.vrf_pk, name.as_bytes(), &ap.vrf_proof) else {
        return Err(ErrorCode::BadVrfProof);
    };
    if lookup_index(&beta) != ap.lookup_index {
        return Err(ErrorCode::BadVrfProof);
    }
    // First-time lookups adopt the received value (trust on first use).
    let value = key.unwrap_or(&ap.leaf.value);
    match ap.verify(name.as_bytes(), value, &snapshot.tree_hash) {
        Ok(()) => Ok(()),
        Err(PathError::BindingsDiffer) => Err(ErrorCode::BindingsDiffer),
        Err(PathError::UnverifiableCommitment) => Err(ErrorCode::BadCommitment),
        Err(PathError::IndicesMismatch) => Err(ErrorCode::BadLookupIndex),
        Err(PathError::UnequalTreeHashes) => Err(ErrorCode::BadAuthPath),
    }
}
