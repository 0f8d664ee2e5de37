// crates/llq-gates/src/gate.rs

use serde::{Deserialize, Serialize};

use llq_core::crypto;

/// Activation value meaning "active from genesis" (boolean on).
pub const VALUE_ALWAYS: u64 = 0;

/// Far-future activation value meaning "off". Gates default to this until
/// an update says otherwise.
pub const VALUE_OFF: u64 = 4_070_908_800;

/// The named enforcement switches.
///
/// Numbered for wire stability; the numbers are part of the signed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateId {
    /// Quorum DKG sessions run at all; session-derived penalty signals
    /// (missed contributions, missed complaint responses) apply.
    DkgEnabled,
    /// Full-mesh connectivity among selected members is required, and
    /// reachability probing of quorum members is performed.
    QuorumAllConnected,
    /// PoSe enforcement: probe/compliance failures accumulate penalty.
    QuorumPose,
}

impl GateId {
    /// Stable wire number for signing.
    pub fn wire_id(&self) -> u32 {
        match self {
            GateId::DkgEnabled => 17,
            GateId::QuorumAllConnected => 21,
            GateId::QuorumPose => 23,
        }
    }

    pub fn all() -> [GateId; 3] {
        [
            GateId::DkgEnabled,
            GateId::QuorumAllConnected,
            GateId::QuorumPose,
        ]
    }
}

/// An authority-signed gate update.
///
/// A gate becomes active at height `h` once enough authority signers agree
/// on a `value <= h`. Per signer, the update with the highest
/// `signed_at_height` wins; older updates from the same signer are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateUpdate {
    pub gate: GateId,
    /// Activation value: active once the chain height reaches it.
    pub value: u64,
    /// Height at which the authority signed; newest per signer wins.
    pub signed_at_height: u64,
    /// ed25519 signature over the update digest by an authority key.
    pub signature: Vec<u8>,
}

impl GateUpdate {
    /// Digest covered by the authority signature:
    /// `sha256(wire_id || value || signed_at_height)`.
    pub fn digest(gate: GateId, value: u64, signed_at_height: u64) -> [u8; 32] {
        let mut payload = Vec::with_capacity(4 + 8 + 8);
        payload.extend_from_slice(&gate.wire_id().to_le_bytes());
        payload.extend_from_slice(&value.to_le_bytes());
        payload.extend_from_slice(&signed_at_height.to_le_bytes());
        crypto::hash_bytes(&payload)
    }

    /// Construct and sign an update with the given authority keypair.
    pub fn signed(
        gate: GateId,
        value: u64,
        signed_at_height: u64,
        authority: &crypto::Keypair,
    ) -> Self {
        let digest = Self::digest(gate, value, signed_at_height);
        GateUpdate {
            gate,
            value,
            signed_at_height,
            signature: authority.sign(&digest),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_ids_distinct() {
        let ids: Vec<u32> = GateId::all().iter().map(|g| g.wire_id()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn test_digest_binds_all_fields() {
        let base = GateUpdate::digest(GateId::QuorumPose, 0, 100);
        assert_ne!(base, GateUpdate::digest(GateId::DkgEnabled, 0, 100));
        assert_ne!(base, GateUpdate::digest(GateId::QuorumPose, 1, 100));
        assert_ne!(base, GateUpdate::digest(GateId::QuorumPose, 0, 101));
    }

    #[test]
    fn test_signed_update_verifies() {
        let authority = crypto::Keypair::generate();
        let update = GateUpdate::signed(GateId::QuorumPose, VALUE_ALWAYS, 50, &authority);
        let digest = GateUpdate::digest(update.gate, update.value, update.signed_at_height);
        let ok = crypto::verify_signature(
            &authority.public_key_bytes(),
            &digest,
            &update.signature,
        )
        .unwrap();
        assert!(ok);
    }
}
