//! Domain entities for the round/term state machine.

mod behaviour;
mod error;
mod miner;
mod round;

pub use behaviour::{BlockConsensusMetadata, ConsensusBehaviour};
pub use error::{ConsensusError, ConsensusResult};
pub use miner::MinerSlot;
pub use round::{CounterDelta, Round};
