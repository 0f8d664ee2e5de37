// crates/llq-probe/src/compliance.rs
//
// Version/compliance checker: a pure comparison of a member's advertised
// protocol version against the configured minimum.

use serde::{Deserialize, Serialize};

use llq_core::Member;

/// Result of a compliance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compliance {
    Compliant,
    Outdated,
}

/// Checks advertised protocol versions against a minimum threshold.
#[derive(Debug, Clone)]
pub struct ComplianceChecker {
    min_protocol_version: u32,
}

impl ComplianceChecker {
    pub fn new(min_protocol_version: u32) -> Self {
        ComplianceChecker {
            min_protocol_version,
        }
    }

    pub fn min_protocol_version(&self) -> u32 {
        self.min_protocol_version
    }

    /// Pure check; recording the result is the caller's job.
    pub fn check(&self, member: &Member) -> Compliance {
        if member.protocol_version >= self.min_protocol_version {
            Compliance::Compliant
        } else {
            Compliance::Outdated
        }
    }
}
