// crates/llq-pose/src/lib.rs
//
// llq-pose: PoSe penalty scoring, ban state, and rehabilitation for the
// long-lived quorum subsystem.
//
// The scorer is the single writer for member and penalty state. Penalties
// accumulate across rounds rather than single-strike banning: one dropped
// probe never eliminates a healthy member, sustained failure over several
// consecutive sessions does. Ban decisions are keyed purely by block height
// and session outcomes so independent replicas converge on identical state.

pub mod manager;
pub mod penalty;
pub mod scorer;

pub use manager::{BanManager, PoseStatus, BAN_HEIGHT_SENTINEL};
pub use penalty::{PenaltyState, PoseParams, PoseSignal};
pub use scorer::PoseScorer;
