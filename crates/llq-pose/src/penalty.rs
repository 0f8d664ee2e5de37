// crates/llq-pose/src/penalty.rs
//
// Penalty policy and per-member penalty state.
//
// Weights and threshold are configurable policy, not protocol invariants.
// The defaults make three consecutive failed sessions cross the threshold
// (3 * 34 = 102 >= 100) while a single transient failure decays away.

use serde::{Deserialize, Serialize};

/// A scoring signal observed for a member during one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoseSignal {
    /// Selected for a session but failed to submit a contribution in time.
    MissedContribution,
    /// Failed to answer the complaint-phase query in time.
    MissedComplaintResponse,
    /// Reachability probe to the registered endpoint failed.
    Unreachable,
    /// Advertised protocol version below the configured minimum.
    Outdated,
}

/// Tunable penalty policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseParams {
    /// Penalty at which a member is banned.
    pub ban_threshold: u32,
    /// Weight added for a missed session contribution.
    pub missed_contribution_weight: u32,
    /// Weight added for a missed complaint response.
    pub missed_complaint_response_weight: u32,
    /// Weight added for a failed reachability probe.
    pub unreachable_weight: u32,
    /// Weight added for an outdated protocol version.
    pub outdated_weight: u32,
    /// Penalty units forgiven per block of good standing.
    pub decay_per_block: u32,
}

impl Default for PoseParams {
    fn default() -> Self {
        PoseParams {
            ban_threshold: 100,
            missed_contribution_weight: 34,
            missed_complaint_response_weight: 34,
            unreachable_weight: 34,
            outdated_weight: 34,
            decay_per_block: 1,
        }
    }
}

impl PoseParams {
    /// Penalty weight for a given signal.
    pub fn weight(&self, signal: PoseSignal) -> u32 {
        match signal {
            PoseSignal::MissedContribution => self.missed_contribution_weight,
            PoseSignal::MissedComplaintResponse => self.missed_complaint_response_weight,
            PoseSignal::Unreachable => self.unreachable_weight,
            PoseSignal::Outdated => self.outdated_weight,
        }
    }
}

/// Per-member penalty accumulator.
///
/// All transitions are keyed by block height, never wall-clock time, so
/// every replica derives the same state from the same session history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltyState {
    /// Accumulated penalty.
    pub penalty: u32,
    /// Height at which decay was last applied.
    pub last_decay_height: u64,
    /// Height at which the member was banned. `None` = not banned.
    /// Once set, only explicit rehabilitation clears it; decay never does.
    pub ban_height: Option<u64>,
}

impl PenaltyState {
    pub fn new(height: u64) -> Self {
        PenaltyState {
            penalty: 0,
            last_decay_height: height,
            ban_height: None,
        }
    }

    pub fn banned(&self) -> bool {
        self.ban_height.is_some()
    }

    /// Apply per-block decay up to `height`. Saturates at zero and never
    /// touches the ban flag.
    pub fn decay_to(&mut self, height: u64, decay_per_block: u32) {
        if height <= self.last_decay_height {
            return;
        }
        let elapsed = height - self.last_decay_height;
        let forgiven = decay_per_block.saturating_mul(elapsed.min(u64::from(u32::MAX)) as u32);
        self.penalty = self.penalty.saturating_sub(forgiven);
        self.last_decay_height = height;
    }
}
