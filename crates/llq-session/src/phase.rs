// crates/llq-session/src/phase.rs
//
// Session phase state machine.
//
// Valid transitions:
//   Init -> Contribution -> Complaint -> Commitment -> Finalized
//   any non-terminal state -> Aborted

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered phases of one quorum session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// Member set is being selected from the eligibility snapshot.
    Init,
    /// Selected members submit their contributions under the phase deadline.
    Contribution,
    /// Members report observed contribution failures.
    Complaint,
    /// Non-faulty, complaint-validated members assemble the commitment.
    Commitment,
    /// Commitment succeeded. Terminal; session data is immutable.
    Finalized,
    /// Deadline or participation threshold missed. Terminal.
    Aborted,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Finalized | SessionPhase::Aborted)
    }

    /// Whether moving to `next` is a legal transition.
    pub fn can_transition_to(&self, next: SessionPhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == SessionPhase::Aborted {
            return true;
        }
        matches!(
            (self, next),
            (SessionPhase::Init, SessionPhase::Contribution)
                | (SessionPhase::Contribution, SessionPhase::Complaint)
                | (SessionPhase::Complaint, SessionPhase::Commitment)
                | (SessionPhase::Commitment, SessionPhase::Finalized)
        )
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Init => "Init",
            SessionPhase::Contribution => "Contribution",
            SessionPhase::Complaint => "Complaint",
            SessionPhase::Commitment => "Commitment",
            SessionPhase::Finalized => "Finalized",
            SessionPhase::Aborted => "Aborted",
        };
        write!(f, "{}", name)
    }
}
