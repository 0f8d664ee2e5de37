// crates/llq-core/src/error.rs

use thiserror::Error;

/// Protocol-wide error types for the LLQ PoSe subsystem.
///
/// Transient network failures never appear here: the prober folds them into
/// probe outcomes locally. Crossing the ban threshold is a state change, not
/// an error, and a session that misses a phase deadline transitions to
/// Aborted rather than erroring. What remains are the failures that must
/// reach a caller with a typed reason.
#[derive(Debug, Error)]
pub enum QuorumError {
    /// Network error (probe transport construction, session transport).
    #[error("Network error: {0}")]
    Network(String),

    /// Rehabilitation or gate-update proof failed verification.
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Invalid session phase transition or inconsistent coordinator state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Member identity not present in the registry.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Cryptographic error (key parsing, signing, verification plumbing).
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Configuration error (bad TOML, malformed keys).
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for QuorumError {
    fn from(e: serde_json::Error) -> Self {
        QuorumError::Serialization(e.to_string())
    }
}

impl From<ed25519_dalek::SignatureError> for QuorumError {
    fn from(e: ed25519_dalek::SignatureError) -> Self {
        QuorumError::Crypto(e.to_string())
    }
}
