// crates/llq-session/src/transport.rs
//
// SessionTransport: the seam between the coordinator and quorum members.
//
// A production implementation sits on the P2P layer; the simulation harness
// (llq-sim) answers in-memory. Implementations answer one request and
// return; the coordinator owns all deadlines.

use async_trait::async_trait;

use llq_core::{MemberId, QuorumError};

/// Requests the coordinator issues to members during a session.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Ask `member` for its contribution. `Ok(())` means the contribution
    /// arrived and verified.
    async fn request_contribution(&self, member: &MemberId) -> Result<(), QuorumError>;

    /// Ask `member` which of `candidates` it observed failing. Returns the
    /// accused subset (possibly empty).
    async fn request_complaints(
        &self,
        member: &MemberId,
        candidates: &[MemberId],
    ) -> Result<Vec<MemberId>, QuorumError>;

    /// Ask `member` for its share of the final commitment.
    async fn request_commitment(&self, member: &MemberId) -> Result<(), QuorumError>;
}
