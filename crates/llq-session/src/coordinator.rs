// crates/llq-session/src/coordinator.rs
//
// The session coordinator drives one quorum session through its phases.
//
// Eligibility is fixed at Init from the scorer's snapshot; behavior observed
// during the session (missed contributions, missed complaint responses) is
// returned as penalty signals for the caller to fold into the scorer for the
// *next* round. Abort paths leave no partial session state behind — the
// session object is terminal either way, and signals are emitted regardless
// of whether the session finalized.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use llq_core::{Clock, MemberId, QuorumError, RoundId};
use llq_gates::{GateId, GateRegistry};
use llq_pose::{PoseScorer, PoseSignal};

use crate::phase::SessionPhase;
use crate::session::{QuorumSession, SessionStats};
use crate::transport::SessionTransport;

/// Coordinator tuning.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sessions below this size abort at Init.
    pub min_quorum_size: usize,
    /// Deadline for each member request within a phase.
    pub phase_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            min_quorum_size: 3,
            phase_timeout: Duration::from_secs(10),
        }
    }
}

/// Result of one session run: the terminal session, its observability
/// stats, and the penalty signals observed along the way.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session: QuorumSession,
    pub stats: SessionStats,
    pub signals: Vec<(MemberId, PoseSignal)>,
}

/// Runs quorum sessions over the currently-eligible member pool.
///
/// Sessions for different rotations may run concurrently (the coordinator
/// holds no cross-session state); each session's phase transitions are
/// single-threaded.
pub struct Coordinator {
    scorer: Arc<PoseScorer>,
    transport: Arc<dyn SessionTransport>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
}

impl Coordinator {
    pub fn new(
        scorer: Arc<PoseScorer>,
        transport: Arc<dyn SessionTransport>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        Coordinator {
            scorer,
            transport,
            clock,
            config,
        }
    }

    /// Run one full session at the given round and height.
    ///
    /// `connectivity` is the set of members with connection evidence from
    /// the current probe round; it gates admission only while the full-mesh
    /// gate is active. Gates are read fresh on every call.
    pub async fn run_session(
        &self,
        round: RoundId,
        height: u64,
        gates: &GateRegistry,
        connectivity: Option<&BTreeSet<MemberId>>,
    ) -> Result<SessionOutcome, QuorumError> {
        let mut session = QuorumSession::new(round, height, self.clock.now());
        let mut signals: Vec<(MemberId, PoseSignal)> = Vec::new();

        // --- Init: fix the member set from a consistent snapshot ---
        let eligible = self.scorer.eligible_snapshot().await;
        let mut selected: Vec<MemberId> = eligible.iter().map(|m| m.id).collect();

        if gates.is_active(GateId::QuorumAllConnected, height) {
            if let Some(connected) = connectivity {
                selected.retain(|id| connected.contains(id));
            }
        }
        session.members = selected;

        if session.members.len() < self.config.min_quorum_size {
            tracing::warn!(
                "Session {}: only {} eligible members (min {}), aborting at Init",
                session.id,
                session.members.len(),
                self.config.min_quorum_size
            );
            return Ok(self.abort(session, 0, 0, 0, signals)?);
        }

        // --- Contribution ---
        session.transition(SessionPhase::Contribution)?;
        let contributed = self
            .collect_acks(&session.members, |transport, member| async move {
                transport.request_contribution(&member).await
            })
            .await;
        session.contributed = contributed;

        let faulty = session.faulty();
        for member in &faulty {
            signals.push((*member, PoseSignal::MissedContribution));
        }

        // No contributions at all (e.g. a partition): nothing left to run a
        // complaint or commitment phase over.
        if session.contributed.is_empty() {
            tracing::warn!(
                "Session {}: no contributions from {} members, aborting at Contribution",
                session.id,
                session.members.len()
            );
            return Ok(self.abort(session, 0, 0, 0, signals)?);
        }

        // --- Complaint ---
        session.transition(SessionPhase::Complaint)?;
        let required_complaints = if faulty.is_empty() {
            0
        } else {
            (session.members.len() - faulty.len()).saturating_sub(1)
        };
        let mut complainers = 0usize;

        if !faulty.is_empty() {
            let mut tasks = JoinSet::new();
            for member in &session.contributed {
                let transport = Arc::clone(&self.transport);
                let member = *member;
                let candidates = faulty.clone();
                let timeout = self.config.phase_timeout;
                tasks.spawn(async move {
                    let reply = tokio::time::timeout(
                        timeout,
                        transport.request_complaints(&member, &candidates),
                    )
                    .await;
                    (member, reply)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                let Ok((member, reply)) = joined else { continue };
                match reply {
                    Ok(Ok(accused)) => {
                        if !accused.is_empty() {
                            complainers += 1;
                            for target in accused {
                                *session.complaints.entry(target).or_insert(0) += 1;
                            }
                        }
                    }
                    Ok(Err(_)) | Err(_) => {
                        signals.push((member, PoseSignal::MissedComplaintResponse));
                    }
                }
            }

            if complainers < required_complaints {
                tracing::warn!(
                    "Session {}: {} complaints (need {}), aborting at Complaint",
                    session.id,
                    complainers,
                    required_complaints
                );
                let expected_commitments = session.members.len() - faulty.len();
                return Ok(self.abort(
                    session,
                    complainers,
                    required_complaints,
                    expected_commitments,
                    signals,
                )?);
            }
        }

        // --- Commitment ---
        session.transition(SessionPhase::Commitment)?;
        let expected_commitments = session.members.len() - faulty.len();
        let non_faulty: Vec<MemberId> = session.contributed.iter().copied().collect();
        let committed = self
            .collect_acks(&non_faulty, |transport, member| async move {
                transport.request_commitment(&member).await
            })
            .await;
        session.committed = committed;

        if session.committed.len() != expected_commitments {
            tracing::warn!(
                "Session {}: {} commitments (expected {}), aborting at Commitment",
                session.id,
                session.committed.len(),
                expected_commitments
            );
            return Ok(self.abort(
                session,
                complainers,
                required_complaints,
                expected_commitments,
                signals,
            )?);
        }

        // --- Finalized ---
        session.transition(SessionPhase::Finalized)?;
        session.finished_at = Some(self.clock.now());
        let stats = SessionStats::from_session(
            &session,
            complainers,
            required_complaints,
            expected_commitments,
        );
        tracing::info!(
            "Session {} finalized: {} members, {} contributions, {} complaints, {} commitments",
            session.id,
            stats.members,
            stats.contributions,
            stats.complaints,
            stats.commitments
        );
        Ok(SessionOutcome {
            session,
            stats,
            signals,
        })
    }

    /// Issue one request per member concurrently, each bounded by the phase
    /// timeout, and return the set that acknowledged in time.
    async fn collect_acks<F, Fut>(&self, members: &[MemberId], request: F) -> BTreeSet<MemberId>
    where
        F: Fn(Arc<dyn SessionTransport>, MemberId) -> Fut,
        Fut: std::future::Future<Output = Result<(), QuorumError>> + Send + 'static,
    {
        let mut tasks = JoinSet::new();
        for member in members {
            let member = *member;
            let timeout = self.config.phase_timeout;
            let fut = request(Arc::clone(&self.transport), member);
            tasks.spawn(async move {
                let reply = tokio::time::timeout(timeout, fut).await;
                (member, matches!(reply, Ok(Ok(()))))
            });
        }

        let mut acked = BTreeSet::new();
        while let Some(joined) = tasks.join_next().await {
            if let Ok((member, ok)) = joined {
                if ok {
                    acked.insert(member);
                }
            }
        }
        acked
    }

    fn abort(
        &self,
        mut session: QuorumSession,
        complainers: usize,
        required_complaints: usize,
        expected_commitments: usize,
        signals: Vec<(MemberId, PoseSignal)>,
    ) -> Result<SessionOutcome, QuorumError> {
        session.transition(SessionPhase::Aborted)?;
        session.finished_at = Some(self.clock.now());
        let stats = SessionStats::from_session(
            &session,
            complainers,
            required_complaints,
            expected_commitments,
        );
        Ok(SessionOutcome {
            session,
            stats,
            signals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use llq_core::{Keypair, Member, SystemClock};
    use llq_gates::{GateUpdate, VALUE_ALWAYS};
    use llq_pose::PoseParams;
    use std::collections::HashSet;
    use tokio::sync::RwLock;

    /// Transport where configured members never answer anything.
    struct ScriptedTransport {
        silent: RwLock<HashSet<MemberId>>,
    }

    impl ScriptedTransport {
        fn new() -> Self {
            ScriptedTransport {
                silent: RwLock::new(HashSet::new()),
            }
        }

        async fn silence(&self, member: MemberId) {
            self.silent.write().await.insert(member);
        }
    }

    #[async_trait]
    impl SessionTransport for ScriptedTransport {
        async fn request_contribution(&self, member: &MemberId) -> Result<(), QuorumError> {
            if self.silent.read().await.contains(member) {
                Err(QuorumError::Network("no contribution".to_string()))
            } else {
                Ok(())
            }
        }

        async fn request_complaints(
            &self,
            member: &MemberId,
            candidates: &[MemberId],
        ) -> Result<Vec<MemberId>, QuorumError> {
            if self.silent.read().await.contains(member) {
                return Err(QuorumError::Network("no complaint response".to_string()));
            }
            // Honest members accuse every faulty candidate they observed.
            Ok(candidates.to_vec())
        }

        async fn request_commitment(&self, member: &MemberId) -> Result<(), QuorumError> {
            if self.silent.read().await.contains(member) {
                Err(QuorumError::Network("no commitment".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn all_gates_on() -> GateRegistry {
        let authority = Keypair::generate();
        let mut registry = GateRegistry::single_authority(authority.public_key_bytes());
        for gate in GateId::all() {
            registry
                .process_update(GateUpdate::signed(gate, VALUE_ALWAYS, 1, &authority))
                .unwrap();
        }
        registry
    }

    async fn setup(n: u8) -> (Arc<PoseScorer>, Arc<ScriptedTransport>, Coordinator, Vec<Member>) {
        let scorer = Arc::new(PoseScorer::new(PoseParams::default()));
        let mut members = Vec::new();
        for i in 1..=n {
            let member = Member::new(format!("10.0.0.{}:19999", i), [i; 32], 70016, 0);
            scorer.register(member.clone(), 0).await;
            members.push(member);
        }
        let transport = Arc::new(ScriptedTransport::new());
        let coordinator = Coordinator::new(
            Arc::clone(&scorer),
            Arc::clone(&transport) as Arc<dyn SessionTransport>,
            Arc::new(SystemClock),
            SessionConfig {
                min_quorum_size: 3,
                phase_timeout: Duration::from_millis(500),
            },
        );
        (scorer, transport, coordinator, members)
    }

    #[tokio::test]
    async fn test_healthy_session_finalizes() {
        let (_scorer, _transport, coordinator, members) = setup(5).await;
        let gates = all_gates_on();

        let outcome = coordinator.run_session(1, 100, &gates, None).await.unwrap();
        assert_eq!(outcome.session.phase, SessionPhase::Finalized);
        assert_eq!(outcome.stats.members, members.len());
        assert_eq!(outcome.stats.contributions, members.len());
        assert_eq!(outcome.stats.complaints, 0);
        assert_eq!(outcome.stats.commitments, members.len());
        assert!(outcome.signals.is_empty());
    }

    #[tokio::test]
    async fn test_faulty_member_complaint_accounting() {
        let (_scorer, transport, coordinator, members) = setup(6).await;
        let gates = all_gates_on();
        let faulty_id = members[5].id;
        transport.silence(faulty_id).await;

        let outcome = coordinator.run_session(1, 100, &gates, None).await.unwrap();
        let m = members.len();
        let f = 1;

        assert_eq!(outcome.session.phase, SessionPhase::Finalized);
        assert_eq!(outcome.stats.contributions, m - f);
        // Every contributing member complained about the faulty one.
        assert!(outcome.stats.complaints >= m - f - 1);
        assert_eq!(outcome.stats.required_complaints, m - f - 1);
        assert_eq!(outcome.stats.commitments, m - f);
        assert_eq!(outcome.stats.expected_commitments, m - f);
        assert_eq!(outcome.stats.faulty, vec![faulty_id]);
        assert_eq!(outcome.session.complaints.get(&faulty_id), Some(&(m - f)));

        // The faulty member gets exactly one missed-contribution signal.
        assert_eq!(
            outcome.signals,
            vec![(faulty_id, PoseSignal::MissedContribution)]
        );
    }

    #[tokio::test]
    async fn test_all_members_silent_aborts_at_contribution() {
        let (_scorer, transport, coordinator, members) = setup(3).await;
        let gates = all_gates_on();
        for member in &members {
            transport.silence(member.id).await;
        }

        let outcome = coordinator.run_session(1, 100, &gates, None).await.unwrap();
        assert_eq!(outcome.session.phase, SessionPhase::Aborted);
        assert_eq!(outcome.stats.contributions, 0);
        assert_eq!(outcome.stats.faulty.len(), members.len());
        // Every selected member is signaled for the missed contribution.
        assert_eq!(outcome.signals.len(), members.len());
        assert!(outcome
            .signals
            .iter()
            .all(|(_, s)| *s == PoseSignal::MissedContribution));
    }

    #[tokio::test]
    async fn test_session_aborts_below_min_quorum() {
        let (scorer, _transport, coordinator, members) = setup(3).await;
        let gates = all_gates_on();
        scorer.ban(&members[0].id, 50).await.unwrap();

        let outcome = coordinator.run_session(1, 100, &gates, None).await.unwrap();
        assert_eq!(outcome.session.phase, SessionPhase::Aborted);
        assert!(outcome.signals.is_empty());
        assert_eq!(outcome.stats.contributions, 0);
    }

    #[tokio::test]
    async fn test_full_mesh_gate_filters_admission() {
        let (_scorer, _transport, coordinator, members) = setup(5).await;
        let gates = all_gates_on();

        // Only four members have connection evidence this round.
        let connected: BTreeSet<MemberId> =
            members.iter().take(4).map(|m| m.id).collect();

        let outcome = coordinator
            .run_session(1, 100, &gates, Some(&connected))
            .await
            .unwrap();
        assert_eq!(outcome.stats.members, 4);
        assert!(!outcome.session.members.contains(&members[4].id));
    }

    #[tokio::test]
    async fn test_full_mesh_filter_ignored_while_gate_off() {
        let (_scorer, _transport, coordinator, members) = setup(5).await;
        // DKG on, full-mesh off.
        let authority = Keypair::generate();
        let mut gates = GateRegistry::single_authority(authority.public_key_bytes());
        gates
            .process_update(GateUpdate::signed(GateId::DkgEnabled, VALUE_ALWAYS, 1, &authority))
            .unwrap();

        let connected: BTreeSet<MemberId> =
            members.iter().take(2).map(|m| m.id).collect();

        let outcome = coordinator
            .run_session(1, 100, &gates, Some(&connected))
            .await
            .unwrap();
        assert_eq!(outcome.stats.members, members.len());
    }

    #[tokio::test]
    async fn test_eligibility_fixed_at_init() {
        let (scorer, transport, coordinator, members) = setup(5).await;
        let gates = all_gates_on();
        let failing = members[4].id;
        transport.silence(failing).await;

        let outcome = coordinator.run_session(1, 100, &gates, None).await.unwrap();
        // The member was admitted this session even though it then failed.
        assert!(outcome.session.members.contains(&failing));
        assert_eq!(outcome.session.phase, SessionPhase::Finalized);

        // Signals are for the caller to apply afterwards; eligibility is
        // unchanged until they are.
        assert!(scorer.is_eligible(&failing).await);
    }
}
