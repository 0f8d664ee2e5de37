// crates/llq-session/src/session.rs

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use llq_core::{MemberId, QuorumError, RoundId};

use crate::phase::SessionPhase;

/// One run of the contribution/complaint/commitment protocol.
///
/// The member set is fixed at Init; the contributed/complaint/committed
/// subsets fill in as phases run. Once the phase is terminal the session is
/// immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuorumSession {
    pub id: Uuid,
    pub round: RoundId,
    /// Chain height the eligibility snapshot was taken at.
    pub height: u64,
    pub phase: SessionPhase,
    /// Member set selected at Init, sorted by id.
    pub members: Vec<MemberId>,
    /// Members whose contribution arrived within the deadline.
    pub contributed: BTreeSet<MemberId>,
    /// Complaint tally: accused member -> number of distinct complainers.
    pub complaints: BTreeMap<MemberId, usize>,
    /// Members whose commitment arrived within the deadline.
    pub committed: BTreeSet<MemberId>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl QuorumSession {
    pub fn new(round: RoundId, height: u64, started_at: DateTime<Utc>) -> Self {
        QuorumSession {
            id: Uuid::now_v7(),
            round,
            height,
            phase: SessionPhase::Init,
            members: Vec::new(),
            contributed: BTreeSet::new(),
            complaints: BTreeMap::new(),
            committed: BTreeSet::new(),
            started_at,
            finished_at: None,
        }
    }

    /// Move to the next phase, enforcing the state machine.
    pub fn transition(&mut self, next: SessionPhase) -> Result<(), QuorumError> {
        if !self.phase.can_transition_to(next) {
            return Err(QuorumError::InvalidState(format!(
                "session {}: illegal transition {} -> {}",
                self.id, self.phase, next
            )));
        }
        tracing::debug!("Session {}: {} -> {}", self.id, self.phase, next);
        self.phase = next;
        Ok(())
    }

    /// Members that were selected but failed to contribute.
    pub fn faulty(&self) -> Vec<MemberId> {
        self.members
            .iter()
            .filter(|m| !self.contributed.contains(m))
            .copied()
            .collect()
    }
}

/// Observability projection of a finalized or aborted session: expected vs.
/// actual counts for members, contributions, complaints, and commitments.
/// External verifiers use this to confirm protocol correctness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: Uuid,
    pub round: RoundId,
    pub height: u64,
    pub final_phase: SessionPhase,
    /// Members selected at Init.
    pub members: usize,
    /// Contributions received.
    pub contributions: usize,
    /// Distinct members that filed at least one complaint.
    pub complaints: usize,
    /// Minimum complaint count required to reach Commitment
    /// (`members - faulty - 1`, zero when nothing was faulty).
    pub required_complaints: usize,
    /// Commitments received.
    pub commitments: usize,
    /// Commitments required for finalization (`members - faulty`).
    pub expected_commitments: usize,
    /// Members recorded as faulty this session.
    pub faulty: Vec<MemberId>,
}

impl SessionStats {
    pub fn from_session(
        session: &QuorumSession,
        complainers: usize,
        required_complaints: usize,
        expected_commitments: usize,
    ) -> Self {
        SessionStats {
            session_id: session.id,
            round: session.round,
            height: session.height,
            final_phase: session.phase,
            members: session.members.len(),
            contributions: session.contributed.len(),
            complaints: complainers,
            required_complaints,
            commitments: session.committed.len(),
            expected_commitments,
            faulty: session.faulty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(n: u8) -> MemberId {
        MemberId([n; 32])
    }

    #[test]
    fn test_transition_enforced() {
        let mut session = QuorumSession::new(1, 100, Utc::now());
        assert!(session.transition(SessionPhase::Commitment).is_err());
        session.transition(SessionPhase::Contribution).unwrap();
        session.transition(SessionPhase::Complaint).unwrap();
        session.transition(SessionPhase::Commitment).unwrap();
        session.transition(SessionPhase::Finalized).unwrap();
        // Terminal: nothing further.
        assert!(session.transition(SessionPhase::Aborted).is_err());
    }

    #[test]
    fn test_faulty_is_selected_minus_contributed() {
        let mut session = QuorumSession::new(1, 100, Utc::now());
        session.members = vec![member(1), member(2), member(3)];
        session.contributed.insert(member(1));
        session.contributed.insert(member(3));

        let faulty = session.faulty();
        assert_eq!(faulty, vec![member(2)]);
    }

    #[test]
    fn test_stats_projection() {
        let mut session = QuorumSession::new(4, 200, Utc::now());
        session.members = vec![member(1), member(2), member(3), member(4)];
        for n in [1u8, 2, 3] {
            session.contributed.insert(member(n));
        }
        session.phase = SessionPhase::Aborted;

        let stats = SessionStats::from_session(&session, 2, 2, 3);
        assert_eq!(stats.members, 4);
        assert_eq!(stats.contributions, 3);
        assert_eq!(stats.complaints, 2);
        assert_eq!(stats.expected_commitments, 3);
        assert_eq!(stats.faulty, vec![member(4)]);
        assert_eq!(stats.final_phase, SessionPhase::Aborted);
    }
}
