// crates/llq-daemon/src/config.rs
//
// Runtime configuration for the LLQ PoSe daemon.
// Loaded from a TOML file or populated with sensible defaults.

use serde::Deserialize;
use std::fs;

use llq_core::QuorumError;
use llq_pose::PoseParams;

/// One monitored quorum member, as configured.
#[derive(Debug, Clone, Deserialize)]
pub struct MemberConfig {
    /// Network endpoint, "host:port".
    pub endpoint: String,
    /// Operator ed25519 verifying key, hex-encoded (64 chars).
    pub operator_key: String,
    /// Advertised protocol version.
    #[serde(default = "default_protocol_version")]
    pub protocol_version: u32,
}

/// Runtime configuration for the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds between rounds.
    #[serde(default = "default_round_interval_secs")]
    pub round_interval_secs: u64,

    /// Per-probe timeout in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Per-request deadline within a session phase, in milliseconds.
    #[serde(default = "default_phase_timeout_ms")]
    pub phase_timeout_ms: u64,

    /// Sessions below this size abort at Init.
    #[serde(default = "default_min_quorum_size")]
    pub min_quorum_size: usize,

    /// Minimum compliant protocol version.
    #[serde(default = "default_protocol_version")]
    pub min_protocol_version: u32,

    /// Gate authority verifying keys, hex-encoded.
    #[serde(default)]
    pub gate_authority_keys: Vec<String>,

    /// Distinct authority signers required per gate value.
    #[serde(default = "default_min_gate_signers")]
    pub min_gate_signers: usize,

    /// Penalty policy. Omitted fields fall back to the crate defaults.
    #[serde(default)]
    pub pose: PoseParamsConfig,

    /// Members to monitor.
    #[serde(default)]
    pub members: Vec<MemberConfig>,

    /// When > 0, run a self-contained devnet cluster of this many simulated
    /// members instead of monitoring configured endpoints.
    #[serde(default)]
    pub devnet_members: usize,
}

/// TOML-friendly penalty policy with per-field defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct PoseParamsConfig {
    #[serde(default = "default_ban_threshold")]
    pub ban_threshold: u32,
    #[serde(default = "default_signal_weight")]
    pub missed_contribution_weight: u32,
    #[serde(default = "default_signal_weight")]
    pub missed_complaint_response_weight: u32,
    #[serde(default = "default_signal_weight")]
    pub unreachable_weight: u32,
    #[serde(default = "default_signal_weight")]
    pub outdated_weight: u32,
    #[serde(default = "default_decay_per_block")]
    pub decay_per_block: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_round_interval_secs() -> u64 {
    60
}

fn default_probe_timeout_ms() -> u64 {
    1_000
}

fn default_phase_timeout_ms() -> u64 {
    10_000
}

fn default_min_quorum_size() -> usize {
    3
}

fn default_protocol_version() -> u32 {
    70016
}

fn default_min_gate_signers() -> usize {
    1
}

fn default_ban_threshold() -> u32 {
    100
}

fn default_signal_weight() -> u32 {
    34
}

fn default_decay_per_block() -> u32 {
    1
}

impl Default for PoseParamsConfig {
    fn default() -> Self {
        PoseParamsConfig {
            ban_threshold: default_ban_threshold(),
            missed_contribution_weight: default_signal_weight(),
            missed_complaint_response_weight: default_signal_weight(),
            unreachable_weight: default_signal_weight(),
            outdated_weight: default_signal_weight(),
            decay_per_block: default_decay_per_block(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        DaemonConfig {
            log_level: default_log_level(),
            round_interval_secs: default_round_interval_secs(),
            probe_timeout_ms: default_probe_timeout_ms(),
            phase_timeout_ms: default_phase_timeout_ms(),
            min_quorum_size: default_min_quorum_size(),
            min_protocol_version: default_protocol_version(),
            gate_authority_keys: Vec::new(),
            min_gate_signers: default_min_gate_signers(),
            pose: PoseParamsConfig::default(),
            members: Vec::new(),
            devnet_members: 0,
        }
    }
}

impl DaemonConfig {
    /// Load configuration from a TOML file at the given path.
    pub fn load(path: &str) -> Result<Self, QuorumError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| QuorumError::Config(format!("read {}: {}", path, e)))?;
        let config: DaemonConfig = toml::from_str(&contents)
            .map_err(|e| QuorumError::Config(format!("parse {}: {}", path, e)))?;
        Ok(config)
    }

    pub fn pose_params(&self) -> PoseParams {
        PoseParams {
            ban_threshold: self.pose.ban_threshold,
            missed_contribution_weight: self.pose.missed_contribution_weight,
            missed_complaint_response_weight: self.pose.missed_complaint_response_weight,
            unreachable_weight: self.pose.unreachable_weight,
            outdated_weight: self.pose.outdated_weight,
            decay_per_block: self.pose.decay_per_block,
        }
    }
}

/// Parse a 32-byte hex key ("ab01..." or "0xab01...", 64 hex chars).
pub fn parse_hex_key(s: &str) -> Result<[u8; 32], QuorumError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.len() != 64 {
        return Err(QuorumError::Config(format!(
            "expected 64 hex chars, got {}",
            s.len()
        )));
    }
    let mut out = [0u8; 32];
    for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
        let hi = hex_nibble(chunk[0])?;
        let lo = hex_nibble(chunk[1])?;
        out[i] = (hi << 4) | lo;
    }
    Ok(out)
}

fn hex_nibble(b: u8) -> Result<u8, QuorumError> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        _ => Err(QuorumError::Config(format!(
            "invalid hex character '{}'",
            b as char
        ))),
    }
}
