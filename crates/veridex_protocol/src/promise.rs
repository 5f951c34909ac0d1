//! Temporary bindings: signed promises that an absent name will be inserted
//! at the next epoch.

use veridex_primitives::{Hash256, Sig64};

/// A registration promise issued alongside a proof of absence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemporaryBinding {
    /// Lookup index the binding will be inserted at.
    pub index: Hash256,
    /// Key bytes the directory promises to insert.
    pub value: Vec<u8>,
    /// Directory signature over [`TemporaryBinding::signing_message`].
    pub signature: Sig64,
}

impl TemporaryBinding {
    /// Message covered by the promise signature: the enclosing snapshot's
    /// signature, then the index, then the value. Binding the snapshot
    /// signature pins the promise to the epoch it was issued in.
    #[must_use]
    pub fn signing_message(&self, str_sig: &Sig64) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 + 32 + self.value.len());
        out.extend_from_slice(str_sig);
        out.extend_from_slice(&self.index);
        out.extend_from_slice(&self.value);
        out
    }
}
