// crates/llq-sim/src/lib.rs
//
// llq-sim: Deterministic simulation harness for the LLQ PoSe subsystem.
//
// Provides a controllable clock, an in-memory network implementing both the
// probe and session transports, tagged failure-injection variants, and a
// TestContext that wires a full multi-member cluster and drives the
// probe -> score -> session round loop without touching a real network.

pub mod clock;
pub mod context;
pub mod injection;
pub mod network;

pub use clock::SimulationClock;
pub use context::{RoundReport, TestContext};
pub use injection::FailureInjection;
pub use network::SimNetwork;
