// crates/llq-pose/src/manager.rs
//
// BanManager: the external surface over the scorer's state.
//
// `status` is a read-only projection (penalty, ban flag, ban height with the
// -1 sentinel preserved at the boundary). `request_rehabilitation` validates
// an operator-key signature and atomically repairs the member.
//
// Lenient rehabilitation policy: a valid request for a member that is
// neither banned nor penalized succeeds as a no-op (the endpoint update is
// still applied). Callers that need strictness can check `status` first.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use llq_core::{crypto, MemberId, QuorumError};

use crate::scorer::PoseScorer;

/// External rendering of "not banned".
pub const BAN_HEIGHT_SENTINEL: i64 = -1;

/// Boundary projection of a member's PoSe state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseStatus {
    pub member_id: MemberId,
    pub penalty: u32,
    pub banned: bool,
    /// Ban height, or `BAN_HEIGHT_SENTINEL` when not banned.
    pub ban_height: i64,
}

/// Exposes ban state and processes rehabilitation requests.
#[derive(Clone)]
pub struct BanManager {
    scorer: Arc<PoseScorer>,
}

impl BanManager {
    pub fn new(scorer: Arc<PoseScorer>) -> Self {
        BanManager { scorer }
    }

    /// Read-only status projection for operators and external verifiers.
    pub async fn status(&self, member_id: &MemberId) -> Result<PoseStatus, QuorumError> {
        if self.scorer.get_member(member_id).await.is_none() {
            return Err(QuorumError::NotFound(format!("member {}", member_id)));
        }
        let state = self.scorer.penalty_state(member_id).await;
        let (penalty, ban_height) = match state {
            Some(s) => (s.penalty, s.ban_height),
            None => (0, None),
        };
        Ok(PoseStatus {
            member_id: *member_id,
            penalty,
            banned: ban_height.is_some(),
            ban_height: ban_height
                .map(|h| h as i64)
                .unwrap_or(BAN_HEIGHT_SENTINEL),
        })
    }

    /// Process a rehabilitation request: a service-address update signed by
    /// the member's operator key. A valid proof updates the endpoint and
    /// clears penalty and ban atomically.
    pub async fn request_rehabilitation(
        &self,
        member_id: &MemberId,
        new_endpoint: &str,
        proof: &[u8],
    ) -> Result<(), QuorumError> {
        let member = self
            .scorer
            .get_member(member_id)
            .await
            .ok_or_else(|| QuorumError::NotFound(format!("member {}", member_id)))?;

        let digest = crypto::rehabilitation_digest(member_id, new_endpoint);
        let valid = crypto::verify_signature(&member.operator_key, &digest, proof)?;
        if !valid {
            return Err(QuorumError::Authorization(format!(
                "rehabilitation proof for member {} does not verify",
                member_id
            )));
        }

        self.scorer
            .rehabilitate(member_id, Some(new_endpoint.to_string()))
            .await
    }
}
