//! Per-miner round state.

use serde::{Deserialize, Serialize};
use shared_types::{Hash, Pubkey, Timestamp};

/// One miner's slot inside a round.
///
/// The commit-reveal triple (`out_value`, `previous_in_value`, `signature`)
/// drives next-round order derivation; `out_value == None` means the miner
/// has not produced a value-bearing block this round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerSlot {
    pub pubkey: Pubkey,
    /// Production order in the current round, `1..=N`.
    pub order: u32,
    /// Nominal start of this miner's time slot.
    pub expected_mining_time: Timestamp,

    // Cumulative counters, reset only at term boundaries.
    pub produced_blocks: u64,
    pub produced_tiny_blocks: u64,
    pub missed_time_slots: u64,

    // Commit-reveal triple.
    pub out_value: Option<Hash>,
    pub previous_in_value: Option<Hash>,
    pub signature: Option<Hash>,

    /// Candidate order for the following round, before collision resolution.
    pub supposed_order_of_next_round: u32,
    /// Collision-resolved order for the following round; 0 while unassigned.
    pub final_order_of_next_round: u32,

    /// This miner's claim about finality progress.
    pub implied_irreversible_block_height: u64,

    /// Every block timestamp this miner produced within the round.
    pub actual_mining_times: Vec<Timestamp>,
}

impl MinerSlot {
    pub fn new(pubkey: Pubkey, order: u32, expected_mining_time: Timestamp) -> Self {
        Self {
            pubkey,
            order,
            expected_mining_time,
            produced_blocks: 0,
            produced_tiny_blocks: 0,
            missed_time_slots: 0,
            out_value: None,
            previous_in_value: None,
            signature: None,
            supposed_order_of_next_round: 0,
            final_order_of_next_round: 0,
            implied_irreversible_block_height: 0,
            actual_mining_times: Vec::new(),
        }
    }

    /// Whether this miner has published its value for the round.
    pub fn has_published_value(&self) -> bool {
        self.out_value.is_some()
    }

    /// Timestamp of the miner's most recent produced block, if any.
    pub fn latest_actual_mining_time(&self) -> Option<Timestamp> {
        self.actual_mining_times.last().copied()
    }

    /// Number of blocks produced within the slot window starting at
    /// `slot_start` and lasting `interval_ms`.
    pub fn blocks_within_slot(&self, slot_start: Timestamp, interval_ms: u64) -> u64 {
        self.actual_mining_times
            .iter()
            .filter(|t| **t >= slot_start && **t < slot_start + interval_ms)
            .count() as u64
    }

    /// Carry this slot into the next round: fresh round-scoped fields,
    /// cumulative counters preserved.
    pub fn carried_into_next_round(&self, order: u32, expected_mining_time: Timestamp) -> Self {
        Self {
            pubkey: self.pubkey,
            order,
            expected_mining_time,
            produced_blocks: self.produced_blocks,
            produced_tiny_blocks: self.produced_tiny_blocks,
            missed_time_slots: self.missed_time_slots,
            out_value: None,
            // The reveal of the value committed this round.
            previous_in_value: None,
            signature: self.signature,
            supposed_order_of_next_round: 0,
            final_order_of_next_round: 0,
            implied_irreversible_block_height: self.implied_irreversible_block_height,
            actual_mining_times: Vec::new(),
        }
    }
}
