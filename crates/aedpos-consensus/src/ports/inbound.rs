//! Driving port: the per-block entry points the execution engine calls.

use crate::config::ConsensusConfig;
use crate::domain::{BlockConsensusMetadata, ConsensusResult, Round};

/// One call per block, executed transactionally by the surrounding engine:
/// the block's whole state delta is committed or discarded as a unit.
///
/// Every transition entry point fails closed with `NotInitialized` until
/// `initialize` has set the chain class.
pub trait ConsensusApi {
    /// Install the chain configuration. Must precede every other call.
    fn initialize(&self, config: ConsensusConfig) -> ConsensusResult<()>;

    /// Install the genesis round (round 1, term 1).
    fn first_round(&self, round: Round, block_height: u64) -> ConsensusResult<()>;

    /// Apply an `UpdateValue` block: publish the sender's commit-reveal
    /// triple and derive its next-round order.
    fn update_value(&self, input: BlockConsensusMetadata) -> ConsensusResult<()>;

    /// Apply a `TinyBlock` block: record an extra block in the sender's
    /// claimed slot.
    fn update_tiny_block_information(&self, input: BlockConsensusMetadata) -> ConsensusResult<()>;

    /// Apply a `NextRound` block: terminate the round, keep the miner set.
    fn next_round(&self, input: BlockConsensusMetadata) -> ConsensusResult<()>;

    /// Apply a `NextTerm` block: terminate the term, install the election
    /// victors as the new miner set.
    fn next_term(&self, input: BlockConsensusMetadata) -> ConsensusResult<()>;
}
