// crates/llq-gates/src/lib.rs
//
// llq-gates: Named feature gates with signed, height-activated updates.
//
// Gates alter enforcement strictness (DKG on/off, full-mesh connectivity
// required, PoSe enforcement on/off). They are configured externally via
// authority-signed updates and read fresh every round by the coordinator
// and scorer — never cached across rounds, never mutated by readers.

pub mod gate;
pub mod registry;

pub use gate::{GateId, GateUpdate, VALUE_ALWAYS, VALUE_OFF};
pub use registry::GateRegistry;
