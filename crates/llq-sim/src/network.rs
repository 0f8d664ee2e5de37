// crates/llq-sim/src/network.rs
//
// SimNetwork: in-memory stand-in for the real network.
//
// Implements both transport seams: the prober's endpoint connect and the
// coordinator's session requests. Each member has three independent
// switches, which is exactly the degree of freedom the failure-injection
// variants need:
//   - inbound: whether a probe to the member's endpoint succeeds
//   - outbound: whether the member initiates authenticated traffic to us
//   - participating: whether the member answers session requests

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use llq_core::{Member, MemberId, QuorumError};
use llq_probe::ProbeTransport;
use llq_session::SessionTransport;

#[derive(Debug, Clone)]
struct NodeSim {
    inbound: bool,
    outbound: bool,
    participating: bool,
}

impl NodeSim {
    fn healthy() -> Self {
        NodeSim {
            inbound: true,
            outbound: true,
            participating: true,
        }
    }
}

/// In-memory cluster network state.
pub struct SimNetwork {
    nodes: RwLock<HashMap<MemberId, NodeSim>>,
    endpoints: RwLock<HashMap<String, MemberId>>,
}

impl SimNetwork {
    pub fn new() -> Self {
        SimNetwork {
            nodes: RwLock::new(HashMap::new()),
            endpoints: RwLock::new(HashMap::new()),
        }
    }

    /// Add a member in a fully healthy state.
    pub async fn register(&self, member: &Member) {
        self.nodes
            .write()
            .await
            .insert(member.id, NodeSim::healthy());
        self.endpoints
            .write()
            .await
            .insert(member.endpoint.clone(), member.id);
    }

    /// Point a member at a new endpoint (rehabilitation path).
    pub async fn move_endpoint(&self, member_id: MemberId, old: &str, new: &str) {
        let mut endpoints = self.endpoints.write().await;
        endpoints.remove(old);
        endpoints.insert(new.to_string(), member_id);
    }

    pub async fn set_inbound(&self, member_id: &MemberId, up: bool) {
        if let Some(node) = self.nodes.write().await.get_mut(member_id) {
            node.inbound = up;
        }
    }

    pub async fn set_outbound(&self, member_id: &MemberId, up: bool) {
        if let Some(node) = self.nodes.write().await.get_mut(member_id) {
            node.outbound = up;
        }
    }

    pub async fn set_participating(&self, member_id: &MemberId, up: bool) {
        if let Some(node) = self.nodes.write().await.get_mut(member_id) {
            node.participating = up;
        }
    }

    /// Restore all switches to healthy.
    pub async fn restore(&self, member_id: &MemberId) {
        if let Some(node) = self.nodes.write().await.get_mut(member_id) {
            *node = NodeSim::healthy();
        }
    }

    pub async fn has_outbound(&self, member_id: &MemberId) -> bool {
        self.nodes
            .read()
            .await
            .get(member_id)
            .map(|n| n.outbound)
            .unwrap_or(false)
    }

    pub async fn is_participating(&self, member_id: &MemberId) -> bool {
        self.nodes
            .read()
            .await
            .get(member_id)
            .map(|n| n.participating)
            .unwrap_or(false)
    }

    async fn answers(&self, member_id: &MemberId) -> Result<(), QuorumError> {
        if self.is_participating(member_id).await {
            Ok(())
        } else {
            Err(QuorumError::Network(format!(
                "member {} not participating",
                member_id
            )))
        }
    }
}

impl Default for SimNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProbeTransport for SimNetwork {
    async fn connect(&self, endpoint: &str) -> Result<(), QuorumError> {
        let member_id = {
            let endpoints = self.endpoints.read().await;
            endpoints.get(endpoint).copied()
        };
        let Some(member_id) = member_id else {
            return Err(QuorumError::Network(format!(
                "no listener at {}",
                endpoint
            )));
        };

        let nodes = self.nodes.read().await;
        match nodes.get(&member_id) {
            Some(node) if node.inbound => Ok(()),
            _ => Err(QuorumError::Network(format!(
                "connection to {} refused",
                endpoint
            ))),
        }
    }
}

#[async_trait]
impl SessionTransport for SimNetwork {
    async fn request_contribution(&self, member: &MemberId) -> Result<(), QuorumError> {
        self.answers(member).await
    }

    async fn request_complaints(
        &self,
        member: &MemberId,
        candidates: &[MemberId],
    ) -> Result<Vec<MemberId>, QuorumError> {
        self.answers(member).await?;
        // A participating member observed every faulty candidate itself.
        Ok(candidates.to_vec())
    }

    async fn request_commitment(&self, member: &MemberId) -> Result<(), QuorumError> {
        self.answers(member).await
    }
}
