// crates/llq-probe/src/prober.rs
//
// Connectivity prober.
//
// One outcome is recorded per member per round: re-probing the same member
// in the same round returns the first recorded result instead of issuing a
// second connection attempt. `begin_round` resets the window (the probe
// timeout reset of the reference protocol).
//
// Outbound-activity evidence: if a member initiated authenticated traffic
// to us within the current round, a failed inbound probe does not mark it
// unreachable. A member reachable only via its own outbound links is not
// penalized for inbound-probe failure alone.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinSet;

use llq_core::{Clock, Member, MemberId, ProbeOutcome, ProbeResult, RoundId};

use crate::transport::ProbeTransport;

struct RoundWindow {
    round: RoundId,
    recorded: HashMap<MemberId, ProbeResult>,
    outbound_seen: HashSet<MemberId>,
}

/// Issues reachability probes with bounded timeouts and records one outcome
/// per member per round.
pub struct Prober {
    transport: Arc<dyn ProbeTransport>,
    clock: Arc<dyn Clock>,
    window: RwLock<RoundWindow>,
}

impl Prober {
    pub fn new(transport: Arc<dyn ProbeTransport>, clock: Arc<dyn Clock>) -> Self {
        Prober {
            transport,
            clock,
            window: RwLock::new(RoundWindow {
                round: 0,
                recorded: HashMap::new(),
                outbound_seen: HashSet::new(),
            }),
        }
    }

    /// Start a new probe round, clearing recorded outcomes and outbound
    /// evidence from the previous one.
    pub async fn begin_round(&self, round: RoundId) {
        let mut window = self.window.write().await;
        window.round = round;
        window.recorded.clear();
        window.outbound_seen.clear();
    }

    /// Record that `member_id` initiated authenticated traffic to us in the
    /// current round. Counts as connectivity evidence for this round only.
    pub async fn note_outbound_activity(&self, member_id: MemberId) {
        let mut window = self.window.write().await;
        window.outbound_seen.insert(member_id);
    }

    /// Probe a single member, bounded by `timeout`.
    ///
    /// Never blocks past the timeout and never surfaces transport errors:
    /// a failed or timed-out connection becomes an Unreachable/TimedOut
    /// outcome. Idempotent within a round.
    pub async fn probe(&self, member: &Member, timeout: Duration) -> ProbeResult {
        {
            let window = self.window.read().await;
            if let Some(existing) = window.recorded.get(&member.id) {
                return existing.clone();
            }
        }

        let outcome = match tokio::time::timeout(
            timeout,
            self.transport.connect(&member.endpoint),
        )
        .await
        {
            Ok(Ok(())) => ProbeOutcome::Reachable,
            Ok(Err(_)) => ProbeOutcome::Unreachable,
            Err(_elapsed) => ProbeOutcome::TimedOut,
        };

        self.record(member.id, outcome).await
    }

    /// Probe all members concurrently, each with an independent timeout.
    ///
    /// One unresponsive member cannot stall the others; the slowest probe is
    /// bounded by `timeout`, so the whole round is too.
    pub async fn probe_round(&self, members: &[Member], timeout: Duration) -> Vec<ProbeResult> {
        let mut tasks = JoinSet::new();
        for member in members {
            let transport = Arc::clone(&self.transport);
            let member = member.clone();
            tasks.spawn(async move {
                let outcome = match tokio::time::timeout(
                    timeout,
                    transport.connect(&member.endpoint),
                )
                .await
                {
                    Ok(Ok(())) => ProbeOutcome::Reachable,
                    Ok(Err(_)) => ProbeOutcome::Unreachable,
                    Err(_elapsed) => ProbeOutcome::TimedOut,
                };
                (member.id, outcome)
            });
        }

        let mut results = Vec::with_capacity(members.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                // record() dedupes if the member was already probed this round.
                Ok((member_id, outcome)) => results.push(self.record(member_id, outcome).await),
                Err(e) => tracing::warn!("Probe task panicked: {}", e),
            }
        }
        results.sort_by_key(|r| r.member_id);
        results
    }

    async fn record(&self, member_id: MemberId, outcome: ProbeOutcome) -> ProbeResult {
        let mut window = self.window.write().await;

        // Another probe for the same member may have finished first.
        if let Some(existing) = window.recorded.get(&member_id) {
            return existing.clone();
        }

        // Outbound evidence overrides a failed inbound probe.
        let effective = if outcome.is_failure() && window.outbound_seen.contains(&member_id) {
            tracing::debug!(
                "Member {} unreachable inbound but seen outbound; counting as reachable",
                member_id
            );
            ProbeOutcome::Reachable
        } else {
            outcome
        };

        let result = ProbeResult {
            member_id,
            outcome: effective,
            round: window.round,
            probed_at: self.clock.now(),
        };
        window.recorded.insert(member_id, result.clone());
        result
    }
}
