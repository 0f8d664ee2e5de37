// crates/llq-sim/src/injection.rs
//
// Tagged failure-injection variants with a uniform apply contract, so fault
// scenarios compose without inheritance-style strategy objects.

use llq_core::{MemberId, QuorumError};

use crate::context::TestContext;

/// A way of breaking one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureInjection {
    /// Cut the member off entirely: no inbound, no outbound, no session
    /// participation. The member disappears from the online set.
    NetworkIsolation,
    /// Close the listening port only. The member keeps its outbound session
    /// participation but probes to its registered endpoint fail.
    PortClosure,
    /// Force the advertised protocol version below the minimum. The member
    /// stays fully connected.
    VersionDowngrade,
}

impl FailureInjection {
    /// Apply the fault to `member`. Returns whether the member went offline
    /// (i.e. drops out of the expected contributor set).
    pub async fn apply(
        &self,
        ctx: &TestContext,
        member: &MemberId,
    ) -> Result<bool, QuorumError> {
        match self {
            FailureInjection::NetworkIsolation => {
                ctx.network.set_inbound(member, false).await;
                ctx.network.set_outbound(member, false).await;
                ctx.network.set_participating(member, false).await;
                Ok(true)
            }
            FailureInjection::PortClosure => {
                ctx.network.set_inbound(member, false).await;
                // Long-lived outbound links do not count as fresh
                // probe-window evidence once the window resets.
                ctx.network.set_outbound(member, false).await;
                Ok(false)
            }
            FailureInjection::VersionDowngrade => {
                ctx.scorer
                    .set_protocol_version(member, ctx.outdated_protocol_version())
                    .await?;
                Ok(false)
            }
        }
    }
}
