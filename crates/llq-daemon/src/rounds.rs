// crates/llq-daemon/src/rounds.rs
//
// RoundRunner: the per-round control flow of the daemon.
//
// Each round advances the height, probes the eligible set, checks protocol
// compliance, optionally runs a quorum session, and folds every observation
// into the scorer. Sessions need a wired transport; a monitoring-only
// deployment leaves it unset and the runner skips the session step.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use llq_core::{Clock, MemberId, ProbeOutcome, QuorumError, RoundId};
use llq_gates::{GateId, GateRegistry, GateUpdate};
use llq_pose::{PoseScorer, PoseSignal};
use llq_probe::{Compliance, ComplianceChecker, Prober};
use llq_session::{Coordinator, SessionStats, SessionTransport};

/// Summary of one completed round, for logging and status reporting.
#[derive(Debug, Clone)]
pub struct RoundSummary {
    pub round: RoundId,
    pub height: u64,
    pub probed: usize,
    pub unreachable: usize,
    pub outdated: usize,
    pub session: Option<SessionStats>,
}

/// Drives the PoSe subsystem one round at a time.
pub struct RoundRunner {
    scorer: Arc<PoseScorer>,
    prober: Arc<Prober>,
    checker: ComplianceChecker,
    coordinator: Option<Coordinator>,
    gates: Arc<RwLock<GateRegistry>>,
    probe_timeout: Duration,
    height: RwLock<u64>,
    round: RwLock<RoundId>,
}

impl RoundRunner {
    pub fn new(
        scorer: Arc<PoseScorer>,
        prober: Arc<Prober>,
        checker: ComplianceChecker,
        gates: Arc<RwLock<GateRegistry>>,
        probe_timeout: Duration,
    ) -> Self {
        RoundRunner {
            scorer,
            prober,
            checker,
            coordinator: None,
            gates,
            probe_timeout,
            height: RwLock::new(0),
            round: RwLock::new(0),
        }
    }

    /// Wire a session transport, enabling the session step of each round.
    pub fn with_sessions(
        mut self,
        transport: Arc<dyn SessionTransport>,
        clock: Arc<dyn Clock>,
        config: llq_session::SessionConfig,
    ) -> Self {
        self.coordinator = Some(Coordinator::new(
            Arc::clone(&self.scorer),
            transport,
            clock,
            config,
        ));
        self
    }

    /// Apply an externally-received gate update.
    pub async fn apply_gate_update(&self, update: GateUpdate) -> Result<(), QuorumError> {
        self.gates.write().await.process_update(update)
    }

    pub async fn current_height(&self) -> u64 {
        *self.height.read().await
    }

    /// Run one full round.
    pub async fn run_round(&self) -> Result<RoundSummary, QuorumError> {
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
            "Round {} at height {}: {} eligible members",
            round,
            height,
            eligible.len()
        );

        let mut probed = 0usize;
        let mut unreachable = 0usize;

        // Reachability probing runs while the full-mesh gate is active.
        let connectivity = if gates.is_active(GateId::QuorumAllConnected, height) {
            let results = self
                .prober
                .probe_round(&eligible, self.probe_timeout)
                .await;
            probed = results.len();

            let mut connected = BTreeSet::new();
            for result in &results {
                if result.outcome == ProbeOutcome::Reachable {
                    connected.insert(result.member_id);
                } else {
                    unreachable += 1;
                    self.scorer
                        .update(&result.member_id, PoseSignal::Unreachable, height, &gates)
                        .await?;
                }
            }
            Some(connected)
        } else {
            None
        };

        // Compliance observations feed the scorer before the session.
        let mut outdated = 0usize;
        for member in &eligible {
            if self.checker.check(member) == Compliance::Outdated {
                outdated += 1;
                self.scorer
                    .update(&member.id, PoseSignal::Outdated, height, &gates)
                    .await?;
            }
        }

        let session = match &self.coordinator {
            Some(coordinator) => {
                let outcome = coordinator
                    .run_session(round, height, &gates, connectivity.as_ref())
                    .await?;
                // Session observations are next-round signals.
                for (member_id, signal) in &outcome.signals {
                    self.scorer.update(member_id, *signal, height, &gates).await?;
                }
                Some(outcome.stats)
            }
            None => None,
        };

        Ok(RoundSummary {
            round,
            height,
            probed,
            unreachable,
            outdated,
            session,
        })
    }

    /// Record an authenticated connection initiated by a member this round.
    /// The prober treats it as evidence against a failed inbound probe.
    pub async fn note_outbound_activity(&self, member_id: MemberId) {
        self.prober.note_outbound_activity(member_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llq_core::{Keypair, Member, SystemClock};
    use llq_gates::VALUE_ALWAYS;
    use llq_pose::PoseParams;
    use llq_probe::ProbeTransport;
    use async_trait::async_trait;

    /// Transport where every endpoint is down.
    struct DeadTransport;

    #[async_trait]
    impl ProbeTransport for DeadTransport {
        async fn connect(&self, endpoint: &str) -> Result<(), QuorumError> {
            Err(QuorumError::Network(format!("{} down", endpoint)))
        }
    }

    fn runner_with_gates(on: bool) -> (RoundRunner, Arc<PoseScorer>, Vec<Member>) {
        let scorer = Arc::new(PoseScorer::new(PoseParams::default()));
        let prober = Arc::new(Prober::new(
            Arc::new(DeadTransport) as Arc<dyn ProbeTransport>,
            Arc::new(SystemClock) as Arc<dyn Clock>,
        ));
        let authority = Keypair::generate();
        let mut gates = GateRegistry::single_authority(authority.public_key_bytes());
        if on {
            for gate in GateId::all() {
                gates
                    .process_update(GateUpdate::signed(gate, VALUE_ALWAYS, 1, &authority))
                    .unwrap();
            }
        }
        let members: Vec<Member> = (1..=3u8)
            .map(|n| Member::new(format!("203.0.113.{}:19999", n), [n; 32], 70016, 0))
            .collect();
        let runner = RoundRunner::new(
            Arc::clone(&scorer),
            prober,
            ComplianceChecker::new(70016),
            Arc::new(RwLock::new(gates)),
            Duration::from_millis(50),
        );
        (runner, scorer, members)
    }

    #[tokio::test]
    async fn test_monitoring_only_round_penalizes_unreachable() {
        let (runner, scorer, members) = runner_with_gates(true);
        for member in &members {
            scorer.register(member.clone(), 0).await;
        }

        let summary = runner.run_round().await.unwrap();
        assert_eq!(summary.height, 1);
        assert_eq!(summary.probed, 3);
        assert_eq!(summary.unreachable, 3);
        assert!(summary.session.is_none());

        for member in &members {
            let state = scorer.penalty_state(&member.id).await.unwrap();
            assert!(state.penalty > 0);
        }
    }

    #[tokio::test]
    async fn test_probing_skipped_while_gate_off() {
        let (runner, scorer, members) = runner_with_gates(false);
        for member in &members {
            scorer.register(member.clone(), 0).await;
        }

        let summary = runner.run_round().await.unwrap();
        assert_eq!(summary.probed, 0);
        assert_eq!(summary.unreachable, 0);
        for member in &members {
            let state = scorer.penalty_state(&member.id).await.unwrap();
            assert_eq!(state.penalty, 0);
        }
    }

    #[tokio::test]
    async fn test_outdated_member_flagged() {
        let (runner, scorer, mut members) = runner_with_gates(true);
        members[0].protocol_version = 70015;
        for member in &members {
            scorer.register(member.clone(), 0).await;
        }

        let summary = runner.run_round().await.unwrap();
        assert_eq!(summary.outdated, 1);
    }
}
