// crates/llq-core/src/member.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto;

/// Stable registration key identifying a quorum member.
///
/// Derived once at registration from the operator's verifying key and never
/// reassigned; endpoint and version changes keep the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberId(pub [u8; 32]);

impl MemberId {
    /// Derive a member id from operator verifying key bytes (SHA-256).
    pub fn from_operator_key(operator_key: &[u8; 32]) -> Self {
        MemberId(crypto::hash_bytes(operator_key))
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short hex prefix is enough to tell members apart in logs.
        for byte in &self.0[..4] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// A registered quorum member.
///
/// Members are never deleted from the registry; deregistration only flips
/// `active`. Mutation is restricted to the PoSe scorer (penalty/ban state
/// lives there) and the ban/rehabilitation manager (endpoint updates).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    /// Stable registration key.
    pub id: MemberId,
    /// Network endpoint, "host:port".
    pub endpoint: String,
    /// Operator's ed25519 verifying key. Authorizes rehabilitation requests.
    pub operator_key: [u8; 32],
    /// Advertised protocol version, compared against the configured minimum.
    pub protocol_version: u32,
    /// Block height at which the member registered.
    pub registered_at_height: u64,
    /// Inactive members are excluded from eligibility but kept in the registry.
    pub active: bool,
}

impl Member {
    /// Create a new active member. The id is derived from the operator key.
    pub fn new(
        endpoint: String,
        operator_key: [u8; 32],
        protocol_version: u32,
        registered_at_height: u64,
    ) -> Self {
        Member {
            id: MemberId::from_operator_key(&operator_key),
            endpoint,
            operator_key,
            protocol_version,
            registered_at_height,
            active: true,
        }
    }
}

/// Identifier for one probe/score/session round.
pub type RoundId = u64;

/// Outcome of a single reachability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeOutcome {
    /// The member's endpoint accepted a connection within the timeout.
    Reachable,
    /// Transport-level failure (refused, unroutable).
    Unreachable,
    /// No answer within the probe timeout. Scored the same as Unreachable.
    TimedOut,
}

impl ProbeOutcome {
    /// Whether this outcome counts as a reachability failure for scoring.
    pub fn is_failure(&self) -> bool {
        !matches!(self, ProbeOutcome::Reachable)
    }
}

/// One recorded probe observation.
///
/// Ephemeral: produced by the prober, consumed exactly once by the scorer,
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub member_id: MemberId,
    pub outcome: ProbeOutcome,
    pub round: RoundId,
    pub probed_at: DateTime<Utc>,
}
