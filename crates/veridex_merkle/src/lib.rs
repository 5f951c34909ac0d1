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

//! veridex merkle — signed tree roots and authentication paths.
//!
//! The directory publishes one `SignedTreeRoot` per epoch and answers lookups
//! with an `AuthenticationPath` against that root. This crate defines both
//! structures, their canonical byte codecs, the hash-chain predicate linking
//! consecutive roots, and client-side path verification. Tree construction is
//! the directory's business; everything here recomputes and compares.

use thiserror::Error;
use veridex_primitives::{constants, ct_eq_hash, h_tag, le_bytes, Hash256, Pk32, Sig64};

/// Maximum depth of a leaf in the sparse tree (the lookup index has 256 bits).
pub const MAX_TREE_LEVEL: u32 = 256;
/// Size cap on a leaf value; enforced before verification.
pub const MAX_VALUE_LEN: usize = 65_536;
/// VRF proof size (RFC 9381 ECVRF, 80 bytes).
pub const VRF_PROOF_BYTES: usize = 80;
/// VRF output size (64-byte beta).
pub const VRF_OUTPUT_BYTES: usize = 64;

/// Conventional previous-root pointer of the genesis snapshot (epoch 0).
pub const GENESIS_PREV_HASH: Hash256 = [0u8; 32];

/// Directory policies carried inside every signed tree root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Policies {
    pub version: u32,
    pub epoch_deadline: u64,
    /// Public key of the VRF mapping names to lookup indices.
    pub vrf_pk: Pk32,
}

/// Per-epoch signed commitment to the directory state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTreeRoot {
    pub epoch: u64,
    pub prev_epoch: u64,
    pub tree_hash: Hash256,
    /// Digest of the previous epoch's serialized root; [`GENESIS_PREV_HASH`] at epoch 0.
    pub prev_str_hash: Hash256,
    pub policies: Policies,
    /// Signature over [`SignedTreeRoot::serialize`] under the directory signing key.
    pub signature: Sig64,
}

impl SignedTreeRoot {
    /// Canonical serialization of the signed portion (everything but the signature).
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + 8 + 32 + 32 + 4 + 8 + 32);
        out.extend_from_slice(&le_bytes::<8>(u128::from(self.epoch)));
        out.extend_from_slice(&le_bytes::<8>(u128::from(self.prev_epoch)));
        out.extend_from_slice(&self.tree_hash);
        out.extend_from_slice(&self.prev_str_hash);
        out.extend_from_slice(&le_bytes::<4>(u128::from(self.policies.version)));
        out.extend_from_slice(&le_bytes::<8>(u128::from(self.policies.epoch_deadline)));
        out.extend_from_slice(&self.policies.vrf_pk);
        out
    }

    /// Digest of the serialized root; successors carry this as `prev_str_hash`.
    #[must_use]
    pub fn digest(&self) -> Hash256 {
        h_tag(constants::TAG_STR, &[&self.serialize()])
    }

    /// Whether `self` extends `prev` by exactly one epoch.
    ///
    /// The chain pointer commits to the previous snapshot's content (its
    /// serialized signed portion), not to its signature bytes.
    #[must_use]
    pub fn verify_hash_chain(&self, prev: &Self) -> bool {
        self.prev_epoch == prev.epoch
            && self.epoch == prev.epoch + 1
            && ct_eq_hash(&self.prev_str_hash, &prev.digest())
    }
}

/// What an authentication path proves about the looked-up name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProofType {
    Inclusion,
    Absence,
}

/// Salted commitment to a name-to-value binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commitment {
    pub salt: Hash256,
    pub digest: Hash256,
}

impl Commitment {
    /// Recompute the commitment from an opening and compare.
    #[must_use]
    pub fn open(&self, name: &[u8], value: &[u8]) -> bool {
        let recomputed = h_tag(constants::TAG_COMMIT, &[&self.salt, name, value]);
        ct_eq_hash(&recomputed, &self.digest)
    }
}

/// Terminal node of an authentication path.
///
/// For an inclusion proof this is the looked-up name's own leaf. For an
/// absence proof it is whatever the lookup ran into: an empty slot, or a
/// different name's leaf whose index shares the lookup prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathLeaf {
    pub index: Hash256,
    pub level: u32,
    pub commitment: Commitment,
    pub value: Vec<u8>,
    pub is_empty: bool,
}

/// Merkle proof of inclusion or absence of one name at one epoch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticationPath {
    pub tree_nonce: Hash256,
    /// VRF output index for the looked-up name.
    pub lookup_index: Hash256,
    /// RFC 9381 proof that `lookup_index` is the name's VRF output.
    pub vrf_proof: Vec<u8>,
    pub leaf: PathLeaf,
    /// Sibling hashes ordered root to leaf; `len == leaf.level`.
    pub siblings: Vec<Hash256>,
}

/// Tree-level verification failures, mapped to protocol codes by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathError {
    /// Name present, but its value differs from the expected one.
    BindingsDiffer,
    /// The leaf commitment does not open to (name, value).
    UnverifiableCommitment,
    /// Absence leaf whose index does not sit on the lookup path.
    IndicesMismatch,
    /// Recomputed root differs from the advertised tree hash.
    UnequalTreeHashes,
}

/// Bit `i` of a 256-bit index, MSB-first.
#[inline]
#[must_use]
const fn index_bit(index: &Hash256, i: u32) -> bool {
    let byte = index[(i / 8) as usize];
    (byte >> (7 - (i % 8))) & 1 == 1
}

/// Whether `index` agrees with `prefix_of` on the first `bits` bits.
#[must_use]
fn shares_prefix(index: &Hash256, prefix_of: &Hash256, bits: u32) -> bool {
    (0..bits).all(|i| index_bit(index, i) == index_bit(prefix_of, i))
}

impl AuthenticationPath {
    /// Inclusion iff the terminal leaf is non-empty and sits at the lookup index.
    #[must_use]
    pub fn proof_type(&self) -> ProofType {
        if !self.leaf.is_empty && self.leaf.index == self.lookup_index {
            ProofType::Inclusion
        } else {
            ProofType::Absence
        }
    }

    fn leaf_hash(&self) -> Hash256 {
        let level_le = le_bytes::<4>(u128::from(self.leaf.level));
        if self.leaf.is_empty {
            h_tag(
                constants::TAG_TREE_EMPTY,
                &[&self.tree_nonce, &self.leaf.index, &level_le],
            )
        } else {
            h_tag(
                constants::TAG_TREE_LEAF,
                &[
                    &self.tree_nonce,
                    &self.leaf.index,
                    &level_le,
                    &self.leaf.commitment.digest,
                ],
            )
        }
    }

    /// Recompute the root by walking the siblings up along the lookup index.
    #[must_use]
    pub fn root_hash(&self) -> Hash256 {
        let mut h = self.leaf_hash();
        for l in (0..self.leaf.level).rev() {
            let sib = &self.siblings[l as usize];
            h = if index_bit(&self.lookup_index, l) {
                h_tag(constants::TAG_TREE_NODE, &[sib, &h])
            } else {
                h_tag(constants::TAG_TREE_NODE, &[&h, sib])
            };
        }
        h
    }

    /// Verify the path against an expected (name, value) binding and tree hash.
    ///
    /// Check order: binding equality and commitment opening (inclusion only),
    /// index prefix agreement (absence with a non-empty leaf), then the
    /// recomputed root. Absence proofs carry another name's commitment, which
    /// this client cannot open; the prefix rule covers that case.
    pub fn verify(&self, name: &[u8], value: &[u8], tree_hash: &Hash256) -> Result<(), PathError> {
        // A structurally malformed path cannot recompute the advertised root.
        if self.leaf.level > MAX_TREE_LEVEL || self.siblings.len() != self.leaf.level as usize {
            return Err(PathError::UnequalTreeHashes);
        }
        match self.proof_type() {
            ProofType::Inclusion => {
                if self.leaf.value != value {
                    return Err(PathError::BindingsDiffer);
                }
                if !self.leaf.commitment.open(name, value) {
                    return Err(PathError::UnverifiableCommitment);
                }
            }
            ProofType::Absence => {
                if !self.leaf.is_empty
                    && !shares_prefix(&self.leaf.index, &self.lookup_index, self.leaf.level)
                {
                    return Err(PathError::IndicesMismatch);
                }
            }
        }
        if !ct_eq_hash(tree_hash, &self.root_hash()) {
            return Err(PathError::UnequalTreeHashes);
        }
        Ok(())
    }
}

/// Derive the tree lookup index from a 64-byte VRF output.
#[must_use]
pub fn lookup_index(beta: &[u8]) -> Hash256 {
    h_tag(constants::TAG_VRF_INDEX, &[beta])
}

// ——— Canonical codecs (wire format) ————————————————————————————————

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("input too short")]
    Short,
    #[error("trailing bytes after decode")]
    Trailing,
    #[error("bad field length or flag")]
    BadLen,
}

const fn read_exact<'a>(src: &mut &'a [u8], n: usize) -> Result<&'a [u8], CodecError> {
    if src.len() < n {
        return Err(CodecError::Short);
    }
    let (a, b) = src.split_at(n);
    *src = b;
    Ok(a)
}

fn read_u32(src: &mut &[u8]) -> Result<u32, CodecError> {
    let b = read_exact(src, 4)?;
    Ok(u32::from_le_bytes(b.try_into().map_err(|_| CodecError::Short)?))
}

fn read_u64(src: &mut &[u8]) -> Result<u64, CodecError> {
    let b = read_exact(src, 8)?;
    Ok(u64::from_le_bytes(b.try_into().map_err(|_| CodecError::Short)?))
}

fn read_hash(src: &mut &[u8]) -> Result<Hash256, CodecError> {
    let b = read_exact(src, 32)?;
    let mut h = [0u8; 32];
    h.copy_from_slice(b);
    Ok(h)
}

fn read_sig(src: &mut &[u8]) -> Result<Sig64, CodecError> {
    let b = read_exact(src, 64)?;
    let mut s = [0u8; 64];
    s.copy_from_slice(b);
    Ok(s)
}

/// Encode a signed tree root: signed portion then the signature.
#[must_use]
pub fn encode_str(root: &SignedTreeRoot) -> Vec<u8> {
    let mut out = root.serialize();
    out.extend_from_slice(&root.signature);
    out
}

pub fn decode_str(mut src: &[u8]) -> Result<SignedTreeRoot, CodecError> {
    let epoch = read_u64(&mut src)?;
    let prev_epoch = read_u64(&mut src)?;
    let tree_hash = read_hash(&mut src)?;
    let prev_str_hash = read_hash(&mut src)?;
    let version = read_u32(&mut src)?;
    let epoch_deadline = read_u64(&mut src)?;
    let vrf_pk = read_hash(&mut src)?;
    let signature = read_sig(&mut src)?;
    if !src.is_empty() {
        return Err(CodecError::Trailing);
    }
    Ok(SignedTreeRoot {
        epoch,
        prev_epoch,
        tree_hash,
        prev_str_hash,
        policies: Policies {
            version,
            epoch_deadline,
            vrf_pk,
        },
        signature,
    })
}

/// Encode an authentication path.
#[must_use]
pub fn encode_auth_path(ap: &AuthenticationPath) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&ap.tree_nonce);
    out.extend_from_slice(&ap.lookup_index);
    out.extend_from_slice(&ap.vrf_proof);
    out.extend_from_slice(&ap.leaf.index);
    out.extend_from_slice(&le_bytes::<4>(u128::from(ap.leaf.level)));
    out.push(u8::from(ap.leaf.is_empty));
    out.extend_from_slice(&le_bytes::<4>(ap.leaf.value.len() as u128));
    out.extend_from_slice(&ap.leaf.value);
    out.extend_from_slice(&ap.leaf.commitment.salt);
    out.extend_from_slice(&ap.leaf.commitment.digest);
    out.extend_from_slice(&le_bytes::<4>(ap.siblings.len() as u128));
    for sib in &ap.siblings {
        out.extend_from_slice(sib);
    }
    out
}

pub fn decode_auth_path(mut src: &[u8]) -> Result<AuthenticationPath, CodecError> {
    let tree_nonce = read_hash(&mut src)?;
    let lookup = read_hash(&mut src)?;
    let vrf_proof = read_exact(&mut src, VRF_PROOF_BYTES)?.to_vec();
    let leaf_index = read_hash(&mut src)?;
    let level = read_u32(&mut src)?;
    if level > MAX_TREE_LEVEL {
        return Err(CodecError::BadLen);
    }
    let is_empty = match read_exact(&mut src, 1)? {
        [0] => false,
        [1] => true,
        _ => return Err(CodecError::BadLen),
    };
    let value_len = read_u32(&mut src)? as usize;
    if value_len > MAX_VALUE_LEN {
        return Err(CodecError::BadLen);
    }
    let value = read_exact(&mut src, value_len)?.to_vec();
    let salt = read_hash(&mut src)?;
    let digest = read_hash(&mut src)?;
    let n_sib = read_u32(&mut src)? as usize;
    if n_sib != level as usize {
        return Err(CodecError::BadLen);
    }
    let mut siblings = Vec::with_capacity(n_sib);
    for _ in 0..n_sib {
        siblings.push(read_hash(&mut src)?);
    }
    if !src.is_empty() {
        return Err(CodecError::Trailing);
    }
    Ok(AuthenticationPath {
        tree_nonce,
        lookup_index: lookup,
        vrf_proof,
        leaf: PathLeaf {
            index: leaf_index,
            level,
            commitment: Commitment { salt, digest },
            value,
            is_empty,
        },
        siblings,
    })
}
