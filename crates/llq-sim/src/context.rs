// crates/llq-sim/src/context.rs
//
// TestContext: a full in-memory cluster for exercising the PoSe subsystem.
//
// Wires the prober, compliance checker, scorer, coordinator, and ban
// manager over a SimNetwork and SimulationClock, and drives the per-round
// control flow: probe -> compliance -> score -> session -> fold session
// signals back into the scorer for the next round.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use llq_core::{crypto, Clock, Keypair, Member, MemberId, ProbeOutcome, QuorumError, RoundId};
use llq_gates::{GateId, GateRegistry, GateUpdate};
use llq_pose::{BanManager, PoseParams, PoseScorer, PoseSignal, PoseStatus};
use llq_probe::{Compliance, ComplianceChecker, Prober, ProbeTransport};
use llq_session::{Coordinator, SessionConfig, SessionStats, SessionTransport};

use crate::clock::SimulationClock;
use crate::network::SimNetwork;

/// Protocol version the simulated cluster runs.
pub const SIM_PROTOCOL_VERSION: u32 = 70016;
/// Version below the minimum, used by the downgrade injection.
pub const SIM_OUTDATED_VERSION: u32 = 70015;

/// What one round produced.
#[derive(Debug, Clone)]
pub struct RoundReport {
    pub round: RoundId,
    pub height: u64,
    pub stats: SessionStats,
}

/// A simulated multi-member cluster.
pub struct TestContext {
    pub clock: Arc<SimulationClock>,
    pub network: Arc<SimNetwork>,
    pub scorer: Arc<PoseScorer>,
    pub prober: Arc<Prober>,
    pub checker: ComplianceChecker,
    pub coordinator: Coordinator,
    pub manager: BanManager,
    gates: RwLock<GateRegistry>,
    authority: Keypair,
    operators: HashMap<MemberId, Keypair>,
    member_ids: Vec<MemberId>,
    height: RwLock<u64>,
    round: RwLock<RoundId>,
    gate_seq: RwLock<u64>,
    probe_timeout: Duration,
}

impl TestContext {
    /// Build a healthy cluster of `n` members with all gates off.
    pub async fn new(n: usize) -> Self {
        Self::with_params(n, PoseParams::default()).await
    }

    pub async fn with_params(n: usize, params: PoseParams) -> Self {
        let clock = Arc::new(SimulationClock::new());
        let network = Arc::new(SimNetwork::new());
        let scorer = Arc::new(PoseScorer::new(params));
        let prober = Arc::new(Prober::new(
            Arc::clone(&network) as Arc<dyn ProbeTransport>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        let coordinator = Coordinator::new(
            Arc::clone(&scorer),
            Arc::clone(&network) as Arc<dyn SessionTransport>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            SessionConfig {
                min_quorum_size: 3,
                phase_timeout: Duration::from_millis(250),
            },
        );
        let manager = BanManager::new(Arc::clone(&scorer));
        let authority = Keypair::generate();
        let gates = GateRegistry::single_authority(authority.public_key_bytes());

        let mut operators = HashMap::new();
        let mut member_ids = Vec::new();
        for i in 0..n {
            let operator = Keypair::generate();
            let member = Member::new(
                format!("10.1.0.{}:19999", i + 1),
                operator.public_key_bytes(),
                SIM_PROTOCOL_VERSION,
                0,
            );
            scorer.register(member.clone(), 0).await;
            network.register(&member).await;
            operators.insert(member.id, operator);
            member_ids.push(member.id);
        }

        TestContext {
            clock,
            network,
            scorer,
            prober,
            checker: ComplianceChecker::new(SIM_PROTOCOL_VERSION),
            coordinator,
            manager,
            gates: RwLock::new(gates),
            authority,
            operators,
            member_ids,
            height: RwLock::new(0),
            round: RwLock::new(0),
            gate_seq: RwLock::new(0),
            probe_timeout: Duration::from_millis(100),
        }
    }

    pub fn member_ids(&self) -> &[MemberId] {
        &self.member_ids
    }

    pub fn outdated_protocol_version(&self) -> u32 {
        SIM_OUTDATED_VERSION
    }

    pub async fn current_height(&self) -> u64 {
        *self.height.read().await
    }

    /// Set a gate via a freshly signed authority update.
    pub async fn set_gate(&self, gate: GateId, value: u64) {
        let seq = {
            let mut seq = self.gate_seq.write().await;
            *seq += 1;
            *seq
        };
        let update = GateUpdate::signed(gate, value, seq, &self.authority);
        self.gates
            .write()
            .await
            .process_update(update)
            .expect("authority-signed update must be accepted");
    }

    pub async fn status(&self, member_id: &MemberId) -> Result<PoseStatus, QuorumError> {
        self.manager.status(member_id).await
    }

    /// Sign a rehabilitation proof with the member's real operator key.
    pub fn sign_rehabilitation(&self, member_id: &MemberId, new_endpoint: &str) -> Vec<u8> {
        let operator = &self.operators[member_id];
        operator.sign(&crypto::rehabilitation_digest(member_id, new_endpoint))
    }

    /// Rehabilitate a member at a new endpoint and restore its simulated
    /// node to full health.
    pub async fn repair_member(
        &self,
        member_id: &MemberId,
        new_endpoint: &str,
    ) -> Result<(), QuorumError> {
        let old = self
            .scorer
            .get_member(member_id)
            .await
            .ok_or_else(|| QuorumError::NotFound(format!("member {}", member_id)))?;

        let proof = self.sign_rehabilitation(member_id, new_endpoint);
        self.manager
            .request_rehabilitation(member_id, new_endpoint, &proof)
            .await?;

        self.network
            .move_endpoint(*member_id, &old.endpoint, new_endpoint)
            .await;
        self.network.restore(member_id).await;
        self.scorer
            .set_protocol_version(member_id, SIM_PROTOCOL_VERSION)
            .await?;
        Ok(())
    }

    /// Run one full round: advance the chain, probe, check compliance, run
    /// a session, and fold the session's signals into the scorer.
    pub async fn run_round(&self) -> Result<RoundReport, QuorumError> {
        let height = {
            let mut height = self.height.write().await;
            *height += 1;
            *height
        };
        let round = {
            let mut round = self.round.write().await;
            *round += 1;
            *round
        };

        self.scorer.advance_height(height).await;
        self.prober.begin_round(round).await;

        // Fresh gate view every round; nothing below caches it.
        let gates = self.gates.read().await.clone();

        let eligible = self.scorer.eligible_snapshot().await;
        tracing::debug!(
            "Sim round {} at height {}: {} eligible members",
            round,
            height,
            eligible.len()
        );

        // Reachability probing runs while the full-mesh gate is active.
        let connectivity = if gates.is_active(GateId::QuorumAllConnected, height) {
            for member in &eligible {
                if self.network.has_outbound(&member.id).await {
                    self.prober.note_outbound_activity(member.id).await;
                }
            }
            let results = self
                .prober
                .probe_round(&eligible, self.probe_timeout)
                .await;

            let mut connected = BTreeSet::new();
            for result in &results {
                if result.outcome == ProbeOutcome::Reachable {
                    connected.insert(result.member_id);
                } else {
                    self.scorer
                        .update(&result.member_id, PoseSignal::Unreachable, height, &gates)
                        .await?;
                }
            }
            // Members that keep answering session requests over their own
            // outbound links still count as connected for admission.
            for member in &eligible {
                if self.network.is_participating(&member.id).await {
                    connected.insert(member.id);
                }
            }
            Some(connected)
        } else {
            None
        };

        // Compliance observations feed the scorer before the session.
        for member in &eligible {
            if self.checker.check(member) == Compliance::Outdated {
                self.scorer
                    .update(&member.id, PoseSignal::Outdated, height, &gates)
                    .await?;
            }
        }

        let outcome = self
            .coordinator
            .run_session(round, height, &gates, connectivity.as_ref())
            .await?;

        // Session observations are next-round signals.
        for (member_id, signal) in &outcome.signals {
            self.scorer.update(member_id, *signal, height, &gates).await?;
        }

        Ok(RoundReport {
            round,
            height,
            stats: outcome.stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injection::FailureInjection;
    use llq_gates::VALUE_ALWAYS;
    use llq_session::SessionPhase;

    #[tokio::test]
    async fn test_healthy_cluster_round_finalizes() {
        let ctx = TestContext::new(5).await;
        ctx.set_gate(GateId::DkgEnabled, VALUE_ALWAYS).await;

        let report = ctx.run_round().await.unwrap();
        assert_eq!(report.stats.final_phase, SessionPhase::Finalized);
        assert_eq!(report.stats.members, 5);
        assert_eq!(report.stats.contributions, 5);
    }

    #[tokio::test]
    async fn test_injection_offline_semantics() {
        let ctx = TestContext::new(4).await;
        let target = ctx.member_ids()[0];

        let went_offline = FailureInjection::NetworkIsolation
            .apply(&ctx, &target)
            .await
            .unwrap();
        assert!(went_offline);

        let went_offline = FailureInjection::PortClosure
            .apply(&ctx, &ctx.member_ids()[1])
            .await
            .unwrap();
        assert!(!went_offline);

        let went_offline = FailureInjection::VersionDowngrade
            .apply(&ctx, &ctx.member_ids()[2])
            .await
            .unwrap();
        assert!(!went_offline);

        let downgraded = ctx.scorer.get_member(&ctx.member_ids()[2]).await.unwrap();
        assert_eq!(downgraded.protocol_version, SIM_OUTDATED_VERSION);
    }

    #[tokio::test]
    async fn test_repair_member_restores_health() {
        let ctx = TestContext::new(4).await;
        let target = ctx.member_ids()[0];
        FailureInjection::NetworkIsolation
            .apply(&ctx, &target)
            .await
            .unwrap();
        ctx.scorer.ban(&target, 5).await.unwrap();

        ctx.repair_member(&target, "10.1.0.1:20001").await.unwrap();

        let status = ctx.status(&target).await.unwrap();
        assert!(!status.banned);
        assert_eq!(status.penalty, 0);
        assert!(ctx.network.connect("10.1.0.1:20001").await.is_ok());
    }
}
