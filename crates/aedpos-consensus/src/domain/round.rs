//! Round entity and its queries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shared_types::{Hash, Pubkey, Timestamp, ZERO_HASH};

use super::MinerSlot;

/// Expected per-miner counter increments for a round-terminating block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CounterDelta {
    pub produced_blocks: u64,
    pub missed_time_slots: u64,
}

/// One scheduling epoch: a fixed miner set with a fixed production order.
///
/// A `Round` is created wholesale by the transition processor and stored
/// atomically; it is never partially mutated outside a single accepted
/// transition. `BTreeMap` keeps miner iteration deterministic, which the
/// round id and order assignment rely on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Round {
    pub round_number: u64,
    pub term_number: u64,
    pub miners: BTreeMap<Pubkey, MinerSlot>,
    pub extra_block_producer_of_previous_round: Option<Pubkey>,
    /// The LIB cursor; non-decreasing across the round's lifetime.
    pub confirmed_irreversible_block_height: u64,
    pub confirmed_irreversible_block_round_number: u64,
    /// True only for the first round of a new term.
    pub is_miner_list_just_changed: bool,
}

impl Round {
    pub fn miner_count(&self) -> usize {
        self.miners.len()
    }

    pub fn contains_miner(&self, pubkey: &Pubkey) -> bool {
        self.miners.contains_key(pubkey)
    }

    pub fn get_miner(&self, pubkey: &Pubkey) -> Option<&MinerSlot> {
        self.miners.get(pubkey)
    }

    pub fn get_miner_mut(&mut self, pubkey: &Pubkey) -> Option<&mut MinerSlot> {
        self.miners.get_mut(pubkey)
    }

    /// Checksum over all expected mining times. Two same-height forks with
    /// divergent schedules produce different round ids.
    pub fn round_id(&self) -> u64 {
        self.miners
            .values()
            .fold(0u64, |acc, m| acc.wrapping_add(m.expected_mining_time))
    }

    /// Miner slots sorted by production order.
    pub fn miners_by_order(&self) -> Vec<&MinerSlot> {
        let mut slots: Vec<&MinerSlot> = self.miners.values().collect();
        slots.sort_by_key(|m| m.order);
        slots
    }

    /// The miner holding a given current-round order, if any.
    pub fn miner_at_order(&self, order: u32) -> Option<&MinerSlot> {
        self.miners.values().find(|m| m.order == order)
    }

    /// Nominal start of the round: the order-1 slot time.
    pub fn started_at(&self) -> Timestamp {
        self.miners
            .values()
            .map(|m| m.expected_mining_time)
            .min()
            .unwrap_or(0)
    }

    /// The extra-block slot opens one interval after the last ordered slot.
    pub fn extra_block_mining_time(&self, mining_interval_ms: u64) -> Timestamp {
        self.miners
            .values()
            .map(|m| m.expected_mining_time)
            .max()
            .unwrap_or(0)
            + mining_interval_ms
    }

    /// XOR fold of every signature published in this round.
    ///
    /// Feeds next-round order derivation: no single miner could predict it
    /// before the round started, since it depends on everyone's prior
    /// contribution.
    pub fn signatures_xor_fold(&self) -> Hash {
        self.miners
            .values()
            .filter_map(|m| m.signature.as_ref())
            .fold(ZERO_HASH, |acc, sig| shared_types::xor_hashes(&acc, sig))
    }

    /// Miners that published a value-bearing block this round.
    pub fn value_producers(&self) -> Vec<&MinerSlot> {
        self.miners
            .values()
            .filter(|m| m.has_published_value())
            .collect()
    }

    /// Final next-round orders already claimed, with their holders.
    pub fn occupied_final_orders(&self) -> Vec<(Pubkey, u32)> {
        self.miners
            .values()
            .filter(|m| m.final_order_of_next_round != 0)
            .map(|m| (m.pubkey, m.final_order_of_next_round))
            .collect()
    }

    /// `pubkey -> produced_blocks` map, reported to the election snapshot.
    pub fn mined_blocks_map(&self) -> BTreeMap<Pubkey, u64> {
        self.miners
            .values()
            .map(|m| (m.pubkey, m.produced_blocks))
            .collect()
    }

    /// Whether `now` falls inside `pubkey`'s expected slot window.
    pub fn is_in_time_slot_of(
        &self,
        pubkey: &Pubkey,
        now: Timestamp,
        mining_interval_ms: u64,
    ) -> bool {
        match self.get_miner(pubkey) {
            Some(m) => {
                now >= m.expected_mining_time
                    && now < m.expected_mining_time + mining_interval_ms
            }
            None => false,
        }
    }

    /// Per-miner counter increments a round-terminating block is expected
    /// to carry: the terminator's own produced block, and one missed slot
    /// for every miner that never published a value this round.
    ///
    /// Both the validation pipeline and the transition processor derive
    /// counters from this, so a proposal carrying arbitrary absolute
    /// counters cannot pass.
    pub fn termination_counter_deltas(&self, sender: &Pubkey) -> BTreeMap<Pubkey, CounterDelta> {
        self.miners
            .values()
            .map(|m| {
                let delta = CounterDelta {
                    produced_blocks: u64::from(&m.pubkey == sender),
                    missed_time_slots: u64::from(!m.has_published_value() && &m.pubkey != sender),
                };
                (m.pubkey, delta)
            })
            .collect()
    }

    /// Check the structural invariant on a candidate round: distinct orders
    /// forming `1..=N`.
    pub fn orders_are_well_formed(&self) -> bool {
        let n = self.miner_count() as u32;
        let mut seen = vec![false; n as usize];
        for m in self.miners.values() {
            if m.order == 0 || m.order > n {
                return false;
            }
            let idx = (m.order - 1) as usize;
            if seen[idx] {
                return false;
            }
            seen[idx] = true;
        }
        true
    }

    /// Check the no-collision invariant on fully assigned next-round orders.
    pub fn final_orders_are_distinct(&self) -> bool {
        let mut orders: Vec<u32> = self
            .miners
            .values()
            .map(|m| m.final_order_of_next_round)
            .filter(|o| *o != 0)
            .collect();
        let before = orders.len();
        orders.sort_unstable();
        orders.dedup();
        orders.len() == before
    }
}
