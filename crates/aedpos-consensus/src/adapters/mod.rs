//! In-memory adapters for the outbound ports, used by tests and local runs.

mod election;
mod treasury;

pub use election::{CandidateRecord, InMemoryElection, SnapshotRecord};
pub use treasury::InMemoryTreasury;
