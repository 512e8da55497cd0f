//! Consensus behaviours and the block metadata wire record.

use serde::{Deserialize, Serialize};
use shared_types::Pubkey;

use super::Round;

/// The behaviour a block claims for its consensus transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsensusBehaviour {
    /// Publish the commit-reveal triple for the sender's slot.
    UpdateValue,
    /// Produce an extra block inside an already-claimed slot.
    TinyBlock,
    /// Terminate the round and install the next one, same miner set.
    NextRound,
    /// Terminate the term: install the election victors as the miner set.
    NextTerm,
}

impl ConsensusBehaviour {
    /// Whether this behaviour replaces the current round wholesale.
    pub fn is_round_transition(&self) -> bool {
        matches!(self, ConsensusBehaviour::NextRound | ConsensusBehaviour::NextTerm)
    }
}

/// Consensus metadata attached to each block.
///
/// Bit-exact contract with the execution engine: one record per block,
/// extracted before the transition entry point is invoked.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockConsensusMetadata {
    pub sender_pubkey: Pubkey,
    pub behaviour: ConsensusBehaviour,
    /// The proposed round. Untrusted until the validation pipeline accepts
    /// it; every keyed lookup into it must fail closed.
    pub round: Round,
    /// Height of the block carrying this record.
    pub block_height: u64,
}
