//! Consensus configuration.

use serde::{Deserialize, Serialize};

/// Chain class set at initialization.
///
/// Side chains run the same round machinery but never rotate terms; their
/// miner set only changes through explicit replacement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainClass {
    Main,
    Side,
}

/// Tunables for the round/term state machine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Chain class (main chains rotate terms, side chains do not).
    pub chain_class: ChainClass,
    /// Width of one production time slot in milliseconds.
    pub mining_interval_ms: u64,
    /// Maximum number of blocks a miner may produce inside one slot.
    pub tiny_block_limit: u64,
    /// Missed-slot count at which a miner is considered evil.
    pub miss_threshold: u64,
    /// Term length in milliseconds.
    pub term_period_ms: u64,
    /// Upper bound on the miner set size.
    pub maximum_miners_count: usize,
}

impl ConsensusConfig {
    pub fn main_chain() -> Self {
        Self {
            chain_class: ChainClass::Main,
            mining_interval_ms: 4_000,
            tiny_block_limit: 8,
            miss_threshold: 2,
            term_period_ms: 7 * 24 * 60 * 60 * 1_000,
            maximum_miners_count: 1_024,
        }
    }

    pub fn side_chain() -> Self {
        Self {
            chain_class: ChainClass::Side,
            ..Self::main_chain()
        }
    }

    /// The minimum number of agreeing miners for consensus decisions:
    /// `floor(N * 2 / 3) + 1`.
    pub fn threshold(miner_count: usize) -> usize {
        miner_count * 2 / 3 + 1
    }
}
