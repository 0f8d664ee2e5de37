// crates/llq-probe/src/lib.rs
//
// llq-probe: Connectivity probing and protocol-version compliance checks
// for the LLQ PoSe subsystem.
//
// The prober issues bounded-timeout reachability checks against member
// endpoints, in parallel, and records one outcome per member per round.
// The compliance checker compares advertised protocol versions against a
// configured minimum. Both feed observations into the PoSe scorer.

pub mod compliance;
pub mod prober;
pub mod transport;

pub use compliance::{Compliance, ComplianceChecker};
pub use prober::Prober;
pub use transport::{ProbeTransport, TcpProbeTransport};
