//! Shape validation, promise validation, and error-gate behavior.

use ed25519_dalek::{Signer, SigningKey};
use rand_core::OsRng;
use veridex_merkle::{
    lookup_index, AuthenticationPath, Commitment, PathLeaf, Policies, SignedTreeRoot,
    GENESIS_PREV_HASH, VRF_OUTPUT_BYTES, VRF_PROOF_BYTES,
};
use veridex_primitives::{constants, h_tag, Hash256, Pk32};
use veridex_protocol::{
    ConsistencyChecks, DirectoryProof, DirectoryProofs, DirectoryResponse, ErrorCode, RequestType,
    Response, TemporaryBinding, VrfVerifier,
};

struct StubVrf;
impl VrfVerifier for StubVrf {
    fn verify(&self, _vrf_pk: &Pk32, alpha: &[u8], _proof: &[u8]) -> Option<Vec<u8>> {
        Some(beta_for(alpha))
    }
}

struct RejectAllVrf;
impl VrfVerifier for RejectAllVrf {
    fn verify(&self, _vrf_pk: &Pk32, _alpha: &[u8], _proof: &[u8]) -> Option<Vec<u8>> {
        None
    }
}

fn beta_for(name: &[u8]) -> Vec<u8> {
    let mut beta = Vec::with_capacity(VRF_OUTPUT_BYTES);
    while beta.len() < VRF_OUTPUT_BYTES {
        beta.extend_from_slice(name);
    }
    beta.truncate(VRF_OUTPUT_BYTES);
    beta
}

fn index_for(name: &str) -> Hash256 {
    lookup_index(&beta_for(name.as_bytes()))
}

fn absence_ap(name: &str) -> AuthenticationPath {
    let index = index_for(name);
    AuthenticationPath {
        tree_nonce: [11u8; 32],
        lookup_index: index,
        vrf_proof: vec![0u8; VRF_PROOF_BYTES],
        leaf: PathLeaf {
            index,
            level: 0,
            commitment: Commitment {
                salt: [0u8; 32],
                digest: [0u8; 32],
            },
            value: vec![],
            is_empty: true,
        },
        siblings: vec![],
    }
}

fn inclusion_ap(name: &str, value: &[u8]) -> AuthenticationPath {
    let index = index_for(name);
    let salt = [5u8; 32];
    let digest = h_tag(constants::TAG_COMMIT, &[&salt, name.as_bytes(), value]);
    AuthenticationPath {
        tree_nonce: [11u8; 32],
        lookup_index: index,
        vrf_proof: vec![0u8; VRF_PROOF_BYTES],
        leaf: PathLeaf {
            index,
            level: 0,
            commitment: Commitment { salt, digest },
            value: value.to_vec(),
            is_empty: false,
        },
        siblings: vec![],
    }
}

struct Fixture {
    sk: SigningKey,
}

impl Fixture {
    fn new() -> Self {
        Self {
            sk: SigningKey::generate(&mut OsRng),
        }
    }

    fn sign_pk(&self) -> Pk32 {
        self.sk.verifying_key().to_bytes()
    }

    fn genesis_str(&self, tree_hash: Hash256) -> SignedTreeRoot {
        let mut root = SignedTreeRoot {
            epoch: 0,
            prev_epoch: 0,
            tree_hash,
            prev_str_hash: GENESIS_PREV_HASH,
            policies: Policies {
                version: 1,
                epoch_deadline: 60,
                vrf_pk: [7u8; 32],
            },
            signature: [0u8; 64],
        };
        root.signature = self.sk.sign(&root.serialize()).to_bytes();
        root
    }

    fn promise_raw(
        &self,
        snapshot: &SignedTreeRoot,
        index: Hash256,
        value: &[u8],
    ) -> TemporaryBinding {
        let mut tb = TemporaryBinding {
            index,
            value: value.to_vec(),
            signature: [0u8; 64],
        };
        tb.signature = self.sk.sign(&tb.signing_message(&snapshot.signature)).to_bytes();
        tb
    }

    fn verifier(&self) -> ConsistencyChecks {
        ConsistencyChecks::new(None, true, self.sign_pk()).unwrap()
    }
}

fn proof_response(
    error: ErrorCode,
    ap: AuthenticationPath,
    snapshot: SignedTreeRoot,
    tb: Option<TemporaryBinding>,
) -> Response {
    Response {
        error,
        res: Some(DirectoryResponse::Proof(DirectoryProof {
            ap,
            str: snapshot,
            tb,
        })),
    }
}

#[test]
fn construction_requires_temporary_bindings() {
    assert!(ConsistencyChecks::new(None, false, [0u8; 32]).is_err());
    assert!(ConsistencyChecks::new(None, true, [0u8; 32]).is_ok());
}

#[test]
fn directory_error_is_returned_without_touching_state() {
    let fx = Fixture::new();
    let mut cc = fx.verifier();
    let msg = Response {
        error: ErrorCode::MalformedMessage,
        res: None,
    };
    let code = cc.handle_response(RequestType::Registration, &msg, "alice", None, &StubVrf);
    assert_eq!(code, ErrorCode::MalformedMessage);
    assert!(cc.trusted_str().is_none());
}

#[test]
fn registration_without_a_proof_payload_is_malformed() {
    let fx = Fixture::new();
    let mut cc = fx.verifier();
    let msg = Response {
        error: ErrorCode::Success,
        res: None,
    };
    assert_eq!(
        cc.handle_response(RequestType::Registration, &msg, "alice", None, &StubVrf),
        ErrorCode::MalformedMessage
    );
}

#[test]
fn monitoring_shape_is_validated() {
    let fx = Fixture::new();
    let ap = absence_ap("alice");
    let snapshot = fx.genesis_str(ap.root_hash());

    // Non-success status.
    let mut cc = fx.verifier();
    let msg = Response {
        error: ErrorCode::NameExisted,
        res: Some(DirectoryResponse::Proofs(DirectoryProofs {
            aps: vec![ap.clone()],
            strs: vec![snapshot.clone()],
        })),
    };
    assert_eq!(
        cc.handle_response(RequestType::Monitoring, &msg, "alice", None, &StubVrf),
        ErrorCode::MalformedMessage
    );

    // Empty proof arrays.
    let msg = Response {
        error: ErrorCode::Success,
        res: Some(DirectoryResponse::Proofs(DirectoryProofs {
            aps: vec![],
            strs: vec![],
        })),
    };
    assert_eq!(
        cc.handle_response(RequestType::Monitoring, &msg, "alice", None, &StubVrf),
        ErrorCode::MalformedMessage
    );

    // Length mismatch between paths and snapshots.
    let msg = Response {
        error: ErrorCode::Success,
        res: Some(DirectoryResponse::Proofs(DirectoryProofs {
            aps: vec![ap.clone()],
            strs: vec![snapshot.clone(), snapshot.clone()],
        })),
    };
    assert_eq!(
        cc.handle_response(RequestType::Monitoring, &msg, "alice", None, &StubVrf),
        ErrorCode::MalformedMessage
    );

    // Single-proof payload where an array is expected.
    let msg = proof_response(ErrorCode::Success, ap, snapshot, None);
    assert_eq!(
        cc.handle_response(RequestType::Monitoring, &msg, "alice", None, &StubVrf),
        ErrorCode::MalformedMessage
    );
}

#[test]
fn unlisted_status_pair_is_malformed_but_the_snapshot_is_kept() {
    let fx = Fixture::new();
    let mut cc = fx.verifier();
    let ap = absence_ap("alice");
    let snapshot = fx.genesis_str(ap.root_hash());
    // NameNotFound is not a registration outcome.
    let msg = proof_response(ErrorCode::NameNotFound, ap, snapshot, None);
    let code = cc.handle_response(RequestType::Registration, &msg, "alice", None, &StubVrf);
    assert_eq!(code, ErrorCode::MalformedMessage);
    // The snapshot was still adopted as non-equivocation evidence.
    assert_eq!(cc.trusted_str().map(|s| s.epoch), Some(0));
    assert!(cc.binding("alice").is_none());
}

#[test]
fn registration_against_an_existing_binding_passes() {
    let fx = Fixture::new();
    let mut cc = fx.verifier();
    let ap = inclusion_ap("alice", b"key1");
    let snapshot = fx.genesis_str(ap.root_hash());
    let msg = proof_response(ErrorCode::NameExisted, ap, snapshot, None);
    let code = cc.handle_response(RequestType::Registration, &msg, "alice", Some(&b"key1"[..]), &StubVrf);
    assert_eq!(code, ErrorCode::Passed);
    assert_eq!(cc.binding("alice"), Some(&b"key1"[..]));
    assert!(cc.temporary_binding("alice").is_none());
    assert!(cc.reg_epoch("alice").is_none());
}

#[test]
fn missing_promise_is_bad_promise() {
    let fx = Fixture::new();
    let mut cc = fx.verifier();
    let ap = absence_ap("alice");
    let snapshot = fx.genesis_str(ap.root_hash());
    let msg = proof_response(ErrorCode::Success, ap, snapshot, None);
    let code = cc.handle_response(RequestType::Registration, &msg, "alice", Some(&b"key1"[..]), &StubVrf);
    assert_eq!(code, ErrorCode::BadPromise);
    // Promise validation failed after the snapshot update; no binding landed.
    assert_eq!(cc.trusted_str().map(|s| s.epoch), Some(0));
    assert!(cc.binding("alice").is_none());
    assert!(cc.temporary_binding("alice").is_none());
}

#[test]
fn tampered_promise_signature_is_bad_signature() {
    let fx = Fixture::new();
    let mut cc = fx.verifier();
    let ap = absence_ap("alice");
    let snapshot = fx.genesis_str(ap.root_hash());
    let mut tb = fx.promise_raw(&snapshot, index_for("alice"), b"key1");
    tb.signature[0] ^= 1;
    let msg = proof_response(ErrorCode::Success, ap, snapshot, Some(tb));
    assert_eq!(
        cc.handle_response(RequestType::Registration, &msg, "alice", Some(&b"key1"[..]), &StubVrf),
        ErrorCode::BadSignature
    );
}

#[test]
fn promise_index_mismatch_is_bad_promise() {
    let fx = Fixture::new();
    let mut cc = fx.verifier();
    let ap = absence_ap("alice");
    let snapshot = fx.genesis_str(ap.root_hash());
    // Validly signed promise for a different index.
    let tb = fx.promise_raw(&snapshot, [9u8; 32], b"key1");
    let msg = proof_response(ErrorCode::Success, ap, snapshot, Some(tb));
    assert_eq!(
        cc.handle_response(RequestType::Registration, &msg, "alice", Some(&b"key1"[..]), &StubVrf),
        ErrorCode::BadPromise
    );
}

#[test]
fn promised_value_differing_from_the_expected_key_is_bindings_differ() {
    let fx = Fixture::new();
    let mut cc = fx.verifier();
    let ap = absence_ap("alice");
    let snapshot = fx.genesis_str(ap.root_hash());
    let tb = fx.promise_raw(&snapshot, index_for("alice"), b"key2");
    let msg = proof_response(ErrorCode::Success, ap, snapshot, Some(tb));
    assert_eq!(
        cc.handle_response(RequestType::Registration, &msg, "alice", Some(&b"key1"[..]), &StubVrf),
        ErrorCode::BindingsDiffer
    );
}

#[test]
fn vrf_rejection_is_bad_vrf_proof() {
    let fx = Fixture::new();
    let mut cc = fx.verifier();
    let ap = inclusion_ap("alice", b"key1");
    let snapshot = fx.genesis_str(ap.root_hash());
    let msg = proof_response(ErrorCode::Success, ap, snapshot, None);
    assert_eq!(
        cc.handle_response(RequestType::KeyLookup, &msg, "alice", Some(&b"key1"[..]), &RejectAllVrf),
        ErrorCode::BadVrfProof
    );
}

#[test]
fn lookup_index_not_matching_the_vrf_output_is_bad_vrf_proof() {
    let fx = Fixture::new();
    let mut cc = fx.verifier();
    let mut ap = inclusion_ap("alice", b"key1");
    ap.lookup_index = [9u8; 32];
    ap.leaf.index = [9u8; 32];
    let snapshot = fx.genesis_str(ap.root_hash());
    let msg = proof_response(ErrorCode::Success, ap, snapshot, None);
    assert_eq!(
        cc.handle_response(RequestType::KeyLookup, &msg, "alice", Some(&b"key1"[..]), &StubVrf),
        ErrorCode::BadVrfProof
    );
}

#[test]
fn lookup_value_differing_from_the_expected_key_is_bindings_differ() {
    let fx = Fixture::new();
    let mut cc = fx.verifier();
    let ap = inclusion_ap("alice", b"key2");
    let snapshot = fx.genesis_str(ap.root_hash());
    let msg = proof_response(ErrorCode::Success, ap, snapshot, None);
    assert_eq!(
        cc.handle_response(RequestType::KeyLookup, &msg, "alice", Some(&b"key1"[..]), &StubVrf),
        ErrorCode::BindingsDiffer
    );
}

#[test]
fn forged_snapshot_signature_is_bad_signature() {
    let fx = Fixture::new();
    let mut cc = fx.verifier();
    // Adopt epoch 0 first.
    let ap0 = absence_ap("alice");
    let str0 = fx.genesis_str(ap0.root_hash());
    let tb = fx.promise_raw(&str0, index_for("alice"), b"key1");
    assert_eq!(
        cc.handle_response(
            RequestType::Registration,
            &proof_response(ErrorCode::Success, ap0, str0.clone(), Some(tb)),
            "alice",
            Some(&b"key1"[..]),
            &StubVrf,
        ),
        ErrorCode::Passed
    );

    // Epoch 1 arrives with a bogus signature.
    let ap1 = inclusion_ap("alice", b"key1");
    let mut str1 = SignedTreeRoot {
        epoch: 1,
        prev_epoch: 0,
        tree_hash: ap1.root_hash(),
        prev_str_hash: str0.digest(),
        policies: str0.policies.clone(),
        signature: [0u8; 64],
    };
    str1.signature[0] = 1;
    assert_eq!(
        cc.handle_response(
            RequestType::KeyLookup,
            &proof_response(ErrorCode::Success, ap1, str1, None),
            "alice",
            Some(&b"key1"[..]),
            &StubVrf,
        ),
        ErrorCode::BadSignature
    );
}
