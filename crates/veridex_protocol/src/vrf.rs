// veridex_protocol::vrf — RFC 9381 ECVRF adapter (ristretto255 + SHA-512)
// backed by the vrf-r255 crate. Proof and output sizes are hard-coded.

use crate::VrfVerifier;
use veridex_merkle::{VRF_OUTPUT_BYTES, VRF_PROOF_BYTES};
use veridex_primitives::Pk32;

/// Stateless RFC 9381 verifier; the VRF public key rides in the snapshot
/// policies and is supplied per call.
#[derive(Clone, Copy, Debug, Default)]
pub struct R255Verifier;

impl VrfVerifier for R255Verifier {
    fn verify(&self, vrf_pk: &Pk32, alpha: &[u8], proof: &[u8]) -> Option<Vec<u8>> {
        if proof.len() != VRF_PROOF_BYTES {
            return None;
        }
        let pk = vrf_r255::PublicKey::from_bytes(*vrf_pk)?;
        let mut pi = [0u8; VRF_PROOF_BYTES];
        pi.copy_from_slice(proof);
        let pi = vrf_r255::Proof::from_bytes(pi)?;
        let beta: Option<[u8; VRF_OUTPUT_BYTES]> = pk.verify(alpha, &pi).into();
        beta.map(|b| b.to_vec())
    }
}
