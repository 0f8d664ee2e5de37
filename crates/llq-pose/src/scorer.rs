// crates/llq-pose/src/scorer.rs
//
// PoseScorer: single writer for member registry and penalty state.
//
// One RwLock guards the whole state map: read-modify-write on a member's
// penalty/threshold comparison is atomic under the write lock, and
// eligibility snapshots for session Init are taken under one read lock so
// a member cannot be banned and un-banned mid-session.

use std::collections::HashMap;

use tokio::sync::RwLock;

use llq_core::{Member, MemberId, QuorumError};
use llq_gates::{GateId, GateRegistry};

use crate::penalty::{PenaltyState, PoseParams, PoseSignal};

struct ScorerState {
    members: HashMap<MemberId, Member>,
    penalties: HashMap<MemberId, PenaltyState>,
}

/// Accumulates penalty signals and owns ban state.
pub struct PoseScorer {
    params: PoseParams,
    state: RwLock<ScorerState>,
}

impl PoseScorer {
    pub fn new(params: PoseParams) -> Self {
        PoseScorer {
            params,
            state: RwLock::new(ScorerState {
                members: HashMap::new(),
                penalties: HashMap::new(),
            }),
        }
    }

    pub fn params(&self) -> &PoseParams {
        &self.params
    }

    /// Register a member. Re-registering an existing id refreshes endpoint
    /// and version but keeps accumulated penalty state.
    pub async fn register(&self, member: Member, height: u64) {
        let mut state = self.state.write().await;
        state
            .penalties
            .entry(member.id)
            .or_insert_with(|| PenaltyState::new(height));
        state.members.insert(member.id, member);
    }

    pub async fn get_member(&self, member_id: &MemberId) -> Option<Member> {
        let state = self.state.read().await;
        state.members.get(member_id).cloned()
    }

    pub async fn member_count(&self) -> usize {
        let state = self.state.read().await;
        state.members.len()
    }

    /// Update a member's advertised protocol version.
    pub async fn set_protocol_version(
        &self,
        member_id: &MemberId,
        version: u32,
    ) -> Result<(), QuorumError> {
        let mut state = self.state.write().await;
        let member = state
            .members
            .get_mut(member_id)
            .ok_or_else(|| QuorumError::NotFound(format!("member {}", member_id)))?;
        member.protocol_version = version;
        Ok(())
    }

    /// Apply a penalty signal observed at `height`.
    ///
    /// Gates are consulted on every call (the caller passes a fresh
    /// registry reference each round): probe/compliance signals are dropped
    /// while PoSe enforcement is inactive, session signals while DKG is
    /// inactive. Crossing the threshold bans the member at `height`.
    pub async fn update(
        &self,
        member_id: &MemberId,
        signal: PoseSignal,
        height: u64,
        gates: &GateRegistry,
    ) -> Result<(), QuorumError> {
        let enforced = match signal {
            PoseSignal::Unreachable | PoseSignal::Outdated => {
                gates.is_active(GateId::QuorumPose, height)
            }
            PoseSignal::MissedContribution | PoseSignal::MissedComplaintResponse => {
                gates.is_active(GateId::DkgEnabled, height)
            }
        };
        if !enforced {
            tracing::debug!(
                "Dropping {:?} for member {}: enforcement gate inactive at height {}",
                signal,
                member_id,
                height
            );
            return Ok(());
        }

        let weight = self.params.weight(signal);
        let threshold = self.params.ban_threshold;

        let mut state = self.state.write().await;
        if !state.members.contains_key(member_id) {
            return Err(QuorumError::NotFound(format!("member {}", member_id)));
        }
        let entry = state
            .penalties
            .entry(*member_id)
            .or_insert_with(|| PenaltyState::new(height));

        entry.penalty = entry.penalty.saturating_add(weight);
        tracing::debug!(
            "Member {} penalty {} (+{} for {:?}) at height {}",
            member_id,
            entry.penalty,
            weight,
            signal,
            height
        );

        if entry.penalty >= threshold && entry.ban_height.is_none() {
            entry.ban_height = Some(height);
            tracing::warn!(
                "Member {} banned at height {} (penalty {} >= threshold {})",
                member_id,
                height,
                entry.penalty,
                threshold
            );
        }
        Ok(())
    }

    /// Advance the chain height, applying penalty decay to every member.
    pub async fn advance_height(&self, height: u64) {
        let mut state = self.state.write().await;
        for entry in state.penalties.values_mut() {
            entry.decay_to(height, self.params.decay_per_block);
        }
    }

    /// Whether a member may be selected for a session.
    ///
    /// False once the penalty reached the threshold or the ban flag is set,
    /// regardless of any decay since. Unknown and inactive members are
    /// ineligible.
    pub async fn is_eligible(&self, member_id: &MemberId) -> bool {
        let state = self.state.read().await;
        Self::eligible_locked(&state, member_id, self.params.ban_threshold)
    }

    /// Consistent snapshot of all currently-eligible members, taken under a
    /// single read lock. Session Init works from this snapshot.
    pub async fn eligible_snapshot(&self) -> Vec<Member> {
        let state = self.state.read().await;
        let mut eligible: Vec<Member> = state
            .members
            .values()
            .filter(|m| Self::eligible_locked(&state, &m.id, self.params.ban_threshold))
            .cloned()
            .collect();
        eligible.sort_by_key(|m| m.id);
        eligible
    }

    fn eligible_locked(state: &ScorerState, member_id: &MemberId, threshold: u32) -> bool {
        let Some(member) = state.members.get(member_id) else {
            return false;
        };
        if !member.active {
            return false;
        }
        match state.penalties.get(member_id) {
            Some(p) => !p.banned() && p.penalty < threshold,
            None => true,
        }
    }

    /// Ban a member at the given height. Idempotent: re-banning an
    /// already-banned member keeps the original ban height.
    pub async fn ban(&self, member_id: &MemberId, height: u64) -> Result<(), QuorumError> {
        let mut state = self.state.write().await;
        if !state.members.contains_key(member_id) {
            return Err(QuorumError::NotFound(format!("member {}", member_id)));
        }
        let entry = state
            .penalties
            .entry(*member_id)
            .or_insert_with(|| PenaltyState::new(height));
        if entry.ban_height.is_none() {
            entry.ban_height = Some(height);
            tracing::warn!("Member {} banned at height {}", member_id, height);
        }
        Ok(())
    }

    /// Clear a member's penalty and ban state, optionally moving it to a new
    /// endpoint, in one atomic step: no concurrent eligibility query can
    /// observe the penalty cleared but the ban still set, or vice versa.
    pub async fn rehabilitate(
        &self,
        member_id: &MemberId,
        new_endpoint: Option<String>,
    ) -> Result<(), QuorumError> {
        let mut state = self.state.write().await;
        let member = state
            .members
            .get_mut(member_id)
            .ok_or_else(|| QuorumError::NotFound(format!("member {}", member_id)))?;
        if let Some(endpoint) = new_endpoint {
            member.endpoint = endpoint;
        }
        if let Some(entry) = state.penalties.get_mut(member_id) {
            if entry.penalty > 0 || entry.banned() {
                tracing::info!(
                    "Member {} rehabilitated (penalty {} cleared, ban_height {:?})",
                    member_id,
                    entry.penalty,
                    entry.ban_height
                );
            }
            entry.penalty = 0;
            entry.ban_height = None;
        }
        Ok(())
    }

    /// Raw penalty state for the status projection.
    pub async fn penalty_state(&self, member_id: &MemberId) -> Option<PenaltyState> {
        let state = self.state.read().await;
        state.penalties.get(member_id).cloned()
    }
}
