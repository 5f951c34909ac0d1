//! Protocol-wide domain-separation tags.
//!
//! Every hash computed by veridex is domain-tagged; the tags below are the
//! single source of truth and are audited by tests in the crate root.

/// Interior tree node: `H(tag, [left, right])`.
pub const TAG_TREE_NODE: &str = "veridex.tree.node";
/// User leaf: `H(tag, [tree_nonce, index, LE32(level), commitment])`.
pub const TAG_TREE_LEAF: &str = "veridex.tree.leaf";
/// Empty leaf: `H(tag, [tree_nonce, index, LE32(level)])`.
pub const TAG_TREE_EMPTY: &str = "veridex.tree.empty";
/// Salted binding commitment: `H(tag, [salt, name, value])`.
pub const TAG_COMMIT: &str = "veridex.commit";
/// Digest of a serialized signed tree root, used as the hash-chain pointer.
pub const TAG_STR: &str = "veridex.str";
/// Tree lookup index derived from a VRF output: `H(tag, [beta])`.
pub const TAG_VRF_INDEX: &str = "veridex.vrf.index";
/// Per-epoch audit digest over the snapshot signature.
pub const TAG_AUDIT: &str = "veridex.audit";
