// crates/llq-core/src/lib.rs
//
// llq-core: Core member types, clock abstraction, crypto helpers, and errors
// for the long-lived quorum (LLQ) Proof-of-Service subsystem.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines the canonical member model, the probe result types, the
// injectable clock, ed25519 helpers, and the protocol-wide error enum.

pub mod clock;
pub mod crypto;
pub mod error;
pub mod member;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use llq_core::Member;`

// Member types
pub use member::{Member, MemberId, ProbeOutcome, ProbeResult, RoundId};

// Clock
pub use clock::{Clock, SystemClock};

// Crypto
pub use crypto::Keypair;

// Error type
pub use error::QuorumError;
