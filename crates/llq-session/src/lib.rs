// crates/llq-session/src/lib.rs
//
// llq-session: Multi-phase quorum session coordination for the LLQ PoSe
// subsystem.
//
// A session runs Init -> Contribution -> Complaint -> Commitment ->
// Finalized over a member set fixed at Init from the scorer's eligibility
// snapshot, with Aborted reachable from any non-terminal phase on timeout
// or a missed participation threshold. A finalized session's complaint data
// is the authoritative penalty-signal source for the next round.

pub mod coordinator;
pub mod phase;
pub mod session;
pub mod transport;

pub use coordinator::{Coordinator, SessionConfig, SessionOutcome};
pub use phase::SessionPhase;
pub use session::{QuorumSession, SessionStats};
pub use transport::SessionTransport;
