// crates/llq-gates/src/registry.rs
//
// GateRegistry: holds the currently-signed value for each gate and answers
// activation queries against a block height.
//
// Multiple authority signers are supported; a value is adopted once at least
// `min_signers` authorities have signed it. Per signer, only the most
// recently signed update is retained.

use std::collections::HashMap;

use llq_core::{crypto, QuorumError};

use crate::gate::{GateId, GateUpdate, VALUE_OFF};

/// Registry of gate values, updated by signed messages and read by the
/// coordinator and scorer before every round.
#[derive(Debug, Clone)]
pub struct GateRegistry {
    /// Authority verifying keys allowed to sign gate updates.
    authority_keys: Vec<[u8; 32]>,
    /// Minimum number of distinct authority signers that must agree on a
    /// value before it takes effect.
    min_signers: usize,
    /// Latest accepted update per (gate, signer key).
    accepted: HashMap<GateId, HashMap<[u8; 32], GateUpdate>>,
}

impl GateRegistry {
    /// Create a registry with a set of authority keys and signer quorum.
    pub fn new(authority_keys: Vec<[u8; 32]>, min_signers: usize) -> Self {
        GateRegistry {
            authority_keys,
            min_signers: min_signers.max(1),
            accepted: HashMap::new(),
        }
    }

    /// Single-authority registry, the common test/devnet configuration.
    pub fn single_authority(authority_key: [u8; 32]) -> Self {
        Self::new(vec![authority_key], 1)
    }

    /// Process an authority-signed gate update.
    ///
    /// Verifies the signature against each configured authority key; rejects
    /// updates signed by an unknown key and updates that are older than the
    /// signer's already-accepted one.
    pub fn process_update(&mut self, update: GateUpdate) -> Result<(), QuorumError> {
        let digest = GateUpdate::digest(update.gate, update.value, update.signed_at_height);

        let mut signer: Option<[u8; 32]> = None;
        for key in &self.authority_keys {
            if crypto::verify_signature(key, &digest, &update.signature)? {
                signer = Some(*key);
                break;
            }
        }
        let signer = signer.ok_or_else(|| {
            QuorumError::Authorization(format!(
                "gate update for {:?} not signed by a known authority",
                update.gate
            ))
        })?;

        let per_signer = self.accepted.entry(update.gate).or_default();
        if let Some(existing) = per_signer.get(&signer) {
            if existing.signed_at_height >= update.signed_at_height {
                tracing::debug!(
                    "Ignoring stale gate update for {:?} (signed at {} <= {})",
                    update.gate,
                    update.signed_at_height,
                    existing.signed_at_height
                );
                return Ok(());
            }
        }

        tracing::info!(
            "Gate {:?} set to value {} (signed at height {})",
            update.gate,
            update.value,
            update.signed_at_height
        );
        per_signer.insert(signer, update);
        Ok(())
    }

    /// Current value for a gate: the value at least `min_signers` distinct
    /// authorities agree on, or the off sentinel when there is no agreement.
    ///
    /// If more than one value reaches the quorum, the tie is broken by the
    /// most recent supporting `signed_at_height`, then by the lower value —
    /// never by map iteration order, so every replica resolves the same
    /// winner from the same updates.
    pub fn value(&self, gate: GateId) -> u64 {
        let Some(per_signer) = self.accepted.get(&gate) else {
            return VALUE_OFF;
        };

        // value -> (signer count, newest supporting signed_at_height)
        let mut counts: HashMap<u64, (usize, u64)> = HashMap::new();
        for update in per_signer.values() {
            let entry = counts.entry(update.value).or_insert((0, 0));
            entry.0 += 1;
            entry.1 = entry.1.max(update.signed_at_height);
        }

        let mut winner: Option<(u64, u64)> = None; // (newest signed_at, value)
        for (&value, &(count, newest)) in &counts {
            if count < self.min_signers {
                continue;
            }
            let better = match winner {
                None => true,
                Some((w_newest, w_value)) => {
                    newest > w_newest || (newest == w_newest && value < w_value)
                }
            };
            if better {
                winner = Some((newest, value));
            }
        }
        winner.map(|(_, value)| value).unwrap_or(VALUE_OFF)
    }

    /// Whether a gate is active at the given chain height.
    pub fn is_active(&self, gate: GateId, height: u64) -> bool {
        self.value(gate) <= height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::VALUE_ALWAYS;
    use llq_core::Keypair;

    #[test]
    fn test_gates_default_off() {
        let registry = GateRegistry::single_authority([0u8; 32]);
        for gate in GateId::all() {
            assert!(!registry.is_active(gate, 1_000_000));
            assert_eq!(registry.value(gate), VALUE_OFF);
        }
    }

    #[test]
    fn test_signed_update_activates_gate() {
        let authority = Keypair::generate();
        let mut registry = GateRegistry::single_authority(authority.public_key_bytes());

        let update = GateUpdate::signed(GateId::QuorumPose, VALUE_ALWAYS, 10, &authority);
        registry.process_update(update).unwrap();

        assert!(registry.is_active(GateId::QuorumPose, 0));
        assert!(!registry.is_active(GateId::DkgEnabled, 0));
    }

    #[test]
    fn test_height_activation() {
        let authority = Keypair::generate();
        let mut registry = GateRegistry::single_authority(authority.public_key_bytes());

        let update = GateUpdate::signed(GateId::DkgEnabled, 500, 10, &authority);
        registry.process_update(update).unwrap();

        assert!(!registry.is_active(GateId::DkgEnabled, 499));
        assert!(registry.is_active(GateId::DkgEnabled, 500));
        assert!(registry.is_active(GateId::DkgEnabled, 501));
    }

    #[test]
    fn test_unknown_signer_rejected() {
        let authority = Keypair::generate();
        let rogue = Keypair::generate();
        let mut registry = GateRegistry::single_authority(authority.public_key_bytes());

        let update = GateUpdate::signed(GateId::QuorumPose, VALUE_ALWAYS, 10, &rogue);
        let result = registry.process_update(update);
        assert!(matches!(result, Err(QuorumError::Authorization(_))));
        assert!(!registry.is_active(GateId::QuorumPose, 100));
    }

    #[test]
    fn test_stale_update_ignored() {
        let authority = Keypair::generate();
        let mut registry = GateRegistry::single_authority(authority.public_key_bytes());

        registry
            .process_update(GateUpdate::signed(GateId::QuorumPose, VALUE_ALWAYS, 20, &authority))
            .unwrap();
        // Older signature trying to turn the gate back off.
        registry
            .process_update(GateUpdate::signed(GateId::QuorumPose, VALUE_OFF, 10, &authority))
            .unwrap();

        assert!(registry.is_active(GateId::QuorumPose, 100));
    }

    #[test]
    fn test_newer_update_replaces() {
        let authority = Keypair::generate();
        let mut registry = GateRegistry::single_authority(authority.public_key_bytes());

        registry
            .process_update(GateUpdate::signed(GateId::QuorumPose, VALUE_ALWAYS, 20, &authority))
            .unwrap();
        registry
            .process_update(GateUpdate::signed(GateId::QuorumPose, VALUE_OFF, 30, &authority))
            .unwrap();

        assert!(!registry.is_active(GateId::QuorumPose, 100));
    }

    #[test]
    fn test_competing_quorum_values_resolve_deterministically() {
        let a = Keypair::generate();
        let b = Keypair::generate();
        // Two authorities, single-signer quorum: both values qualify.
        let mut registry =
            GateRegistry::new(vec![a.public_key_bytes(), b.public_key_bytes()], 1);

        registry
            .process_update(GateUpdate::signed(GateId::QuorumPose, 500, 10, &a))
            .unwrap();
        registry
            .process_update(GateUpdate::signed(GateId::QuorumPose, VALUE_OFF, 20, &b))
            .unwrap();

        // The more recently signed value wins, on every replica.
        assert_eq!(registry.value(GateId::QuorumPose), VALUE_OFF);

        // Equal signing heights fall back to the lower value.
        let mut tied =
            GateRegistry::new(vec![a.public_key_bytes(), b.public_key_bytes()], 1);
        tied.process_update(GateUpdate::signed(GateId::DkgEnabled, 500, 30, &a))
            .unwrap();
        tied.process_update(GateUpdate::signed(GateId::DkgEnabled, 900, 30, &b))
            .unwrap();
        assert_eq!(tied.value(GateId::DkgEnabled), 500);
    }

    #[test]
    fn test_multi_signer_quorum() {
        let a = Keypair::generate();
        let b = Keypair::generate();
        let c = Keypair::generate();
        let mut registry = GateRegistry::new(
            vec![
                a.public_key_bytes(),
                b.public_key_bytes(),
                c.public_key_bytes(),
            ],
            2,
        );

        registry
            .process_update(GateUpdate::signed(GateId::DkgEnabled, VALUE_ALWAYS, 5, &a))
            .unwrap();
        assert!(!registry.is_active(GateId::DkgEnabled, 100), "one signer is not enough");

        registry
            .process_update(GateUpdate::signed(GateId::DkgEnabled, VALUE_ALWAYS, 6, &b))
            .unwrap();
        assert!(registry.is_active(GateId::DkgEnabled, 100));
    }
}
