#![forbid(unsafe_code)]
#![deny(
    warnings,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::result_large_err
)]

//! veridex protocol — client-side consistency checks for a key-transparency
//! directory.
//!
//! A directory answers registration, lookup, and monitoring requests with
//! cryptographic proofs against its per-epoch signed tree roots. The
//! [`ConsistencyChecks`] engine verifies every response: snapshot signatures
//! and hash-chain linkage (non-equivocation), VRF-indexed authentication
//! paths (binding validity), and temporary-binding promises (registration
//! follow-through). Verification outcomes are reported as [`ErrorCode`]s.

use core::fmt;

use ed25519_dalek::{Signature, VerifyingKey};
use veridex_merkle::{AuthenticationPath, ProofType, SignedTreeRoot};
use veridex_primitives::{Pk32, Sig64};

pub mod audit;
pub mod consistency;
pub mod promise;
#[cfg(feature = "vrf-r255")]
pub mod vrf;

pub use consistency::{ConsistencyChecks, SetupError};
pub use promise::TemporaryBinding;

/// Outcome of handling one directory response, and the directory's own
/// request status codes. The set is closed: every verification failure maps
/// to exactly one of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    /// Request handled by the directory; proofs still require verification.
    Success,
    /// Registration hit an existing binding; carries a proof of that binding.
    NameExisted,
    /// Lookup for an unregistered name; carries a proof of absence.
    NameNotFound,
    /// Response failed shape validation, or the directory reported it could
    /// not parse the request.
    MalformedMessage,
    /// All consistency checks passed.
    Passed,
    /// A signature (snapshot or promise) failed under the pinned key.
    BadSignature,
    /// The snapshot does not match or extend the trusted one.
    BadStr,
    /// The VRF proof or the derived lookup index is wrong.
    BadVrfProof,
    /// The authentication path does not verify against the tree hash.
    BadAuthPath,
    /// The path's terminal leaf sits off the lookup index.
    BadLookupIndex,
    /// The leaf commitment does not open to the claimed binding.
    BadCommitment,
    /// The proven value differs from the expected one.
    BindingsDiffer,
    /// A promise was missing or inconsistent with its proof.
    BadPromise,
    /// A promised binding was not inserted as promised.
    BrokenPromise,
}

impl ErrorCode {
    /// Directory-signalled failures returned unchanged before any
    /// verification. `Success`, `NameExisted`, and `NameNotFound` are *not*
    /// in this set: they must be proven before they are believed.
    #[must_use]
    pub const fn is_directory_error(self) -> bool {
        matches!(self, Self::MalformedMessage)
    }

    /// Status code used by the HTTP pass-through facade.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::Success => 200,
            Self::NameNotFound => 404,
            Self::NameExisted => 409,
            _ => 500,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NameExisted => "name existed",
            Self::NameNotFound => "name not found",
            Self::MalformedMessage => "malformed message",
            Self::Passed => "passed",
            Self::BadSignature => "bad signature",
            Self::BadStr => "bad signed tree root",
            Self::BadVrfProof => "bad vrf proof",
            Self::BadAuthPath => "bad authentication path",
            Self::BadLookupIndex => "bad lookup index",
            Self::BadCommitment => "bad commitment",
            Self::BindingsDiffer => "bindings differ",
            Self::BadPromise => "bad promise",
            Self::BrokenPromise => "broken promise",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three request kinds the verifier knows how to check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestType {
    Registration,
    KeyLookup,
    Monitoring,
}

/// Proof bundle answering a registration or lookup: one path, one snapshot,
/// and a promise when the binding is not yet in the tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryProof {
    pub ap: AuthenticationPath,
    pub str: SignedTreeRoot,
    pub tb: Option<TemporaryBinding>,
}

/// Proof bundle answering a monitoring request: one (path, snapshot) pair per
/// epoch in the requested window, oldest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryProofs {
    pub aps: Vec<AuthenticationPath>,
    pub strs: Vec<SignedTreeRoot>,
}

/// The two response payload shapes a directory can return.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DirectoryResponse {
    Proof(DirectoryProof),
    Proofs(DirectoryProofs),
}

/// A directory response: status code plus an optional proof payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub error: ErrorCode,
    pub res: Option<DirectoryResponse>,
}

impl Response {
    /// The key this response vouches for: the promised value on a proof of
    /// absence with a promise, the leaf value on inclusion, and the most
    /// recent leaf value for a monitoring window.
    #[must_use]
    pub fn received_key(&self) -> Option<&[u8]> {
        match self.res.as_ref()? {
            DirectoryResponse::Proof(df) => match df.ap.proof_type() {
                ProofType::Absence => df.tb.as_ref().map(|tb| tb.value.as_slice()),
                ProofType::Inclusion => Some(df.ap.leaf.value.as_slice()),
            },
            DirectoryResponse::Proofs(dfs) => dfs.aps.last().map(|ap| ap.leaf.value.as_slice()),
        }
    }
}

/// Pluggable VRF verification: returns the 64-byte output on success.
///
/// The engine recomputes the lookup index from the returned output; adapters
/// only establish that the output belongs to `(vrf_pk, alpha)`.
pub trait VrfVerifier {
    fn verify(&self, vrf_pk: &Pk32, alpha: &[u8], proof: &[u8]) -> Option<Vec<u8>>;
}

/// Ed25519 canonical verification via ed25519-dalek. Malformed keys or
/// signatures verify as false; the bytes stay opaque to the caller.
#[must_use]
pub fn verify_sig(pk: &Pk32, msg: &[u8], sig: &Sig64) -> bool {
    match (VerifyingKey::from_bytes(pk), Signature::from_slice(sig)) {
        (Ok(vk), Ok(sig_d)) => vk.verify_strict(msg, &sig_d).is_ok(),
        _ => false,
    }
}
