//! Shared fixtures: a settable clock, deterministic commit-reveal values
//! and a chain driver that feeds the consensus core one block at a time
//! the way an execution engine would.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use aedpos_consensus::adapters::{InMemoryElection, InMemoryTreasury};
use aedpos_consensus::config::ConsensusConfig;
use aedpos_consensus::domain::{
    BlockConsensusMetadata, ConsensusBehaviour, ConsensusError, MinerSlot, Round,
};
use aedpos_consensus::ordering::OrderEngine;
use aedpos_consensus::ports::{ConsensusApi, TimeSource};
use aedpos_consensus::service::{ConsensusDependencies, ConsensusService};
use shared_types::{hash_bytes, Hash, Pubkey, Timestamp};

pub const GENESIS_START: Timestamp = 1_000_000;
pub const INTERVAL: u64 = 4_000;

/// Settable clock shared between the test and the service under test.
#[derive(Clone)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub fn new(now: Timestamp) -> Self {
        Self(Arc::new(AtomicU64::new(now)))
    }

    pub fn set(&self, now: Timestamp) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now_ms(&self) -> Timestamp {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn pubkey(id: u8) -> Pubkey {
    [id; 32]
}

/// Deterministic per-miner, per-round commit-reveal pre-image.
pub fn in_value(id: u8, round_number: u64) -> Hash {
    hash_bytes(&[id, round_number as u8, 0xA7])
}

pub fn genesis_round(n: u8) -> Round {
    let mut round = Round {
        round_number: 1,
        term_number: 1,
        ..Round::default()
    };
    for i in 1..=n {
        let expected = GENESIS_START + (i as u64 - 1) * INTERVAL;
        round
            .miners
            .insert(pubkey(i), MinerSlot::new(pubkey(i), i as u32, expected));
    }
    round
}

pub fn test_config() -> ConsensusConfig {
    ConsensusConfig {
        mining_interval_ms: INTERVAL,
        // Far enough out that rounds never trip a term change by accident.
        term_period_ms: 1_000_000_000,
        ..ConsensusConfig::main_chain()
    }
}

/// Drives a service through blocks, carrying the bookkeeping a real miner
/// node would: block heights, the previous round snapshot and the
/// pre-images it committed to.
pub struct ChainDriver {
    pub service: ConsensusService<InMemoryElection, InMemoryTreasury>,
    pub election: Arc<InMemoryElection>,
    pub treasury: Arc<InMemoryTreasury>,
    pub clock: ManualClock,
    pub height: u64,
    pub previous_round: Option<Round>,
}

impl ChainDriver {
    pub fn new(config: ConsensusConfig, miners: u8) -> Self {
        let election = Arc::new(InMemoryElection::new());
        let treasury = Arc::new(InMemoryTreasury::new());
        let clock = ManualClock::new(GENESIS_START);
        let service = ConsensusService::new(ConsensusDependencies {
            election: Arc::clone(&election),
            treasury: Arc::clone(&treasury),
        })
        .with_time_source(Box::new(clock.clone()));

        service.initialize(config).unwrap();
        service.first_round(genesis_round(miners), 1).unwrap();
        Self {
            service,
            election,
            treasury,
            clock,
            height: 1,
            previous_round: None,
        }
    }

    pub fn next_height(&mut self) -> u64 {
        self.height += 1;
        self.height
    }

    pub fn current(&self) -> Round {
        self.service.current_round().unwrap()
    }

    /// Publish miner `id`'s value inside its own slot.
    pub fn publish_value(&mut self, id: u8) -> Result<(), ConsensusError> {
        self.publish_value_with_implied(id, 0)
    }

    /// Publish miner `id`'s value carrying a finality claim.
    pub fn publish_value_with_implied(
        &mut self,
        id: u8,
        implied_height: u64,
    ) -> Result<(), ConsensusError> {
        let trusted = self.current();
        let round_number = trusted.round_number;
        let reveal = if round_number > 1 {
            Some(in_value(id, round_number - 1))
        } else {
            None
        };
        let out = hash_bytes(&in_value(id, round_number));
        self.publish_triple(id, reveal, out, implied_height)
    }

    /// Publish an explicit commit-reveal triple, computing the signature
    /// the way an honest miner would.
    pub fn publish_triple(
        &mut self,
        id: u8,
        reveal: Option<Hash>,
        out: Hash,
        implied_height: u64,
    ) -> Result<(), ConsensusError> {
        let trusted = self.current();
        let slot_time = trusted
            .get_miner(&pubkey(id))
            .unwrap()
            .expected_mining_time;
        self.clock.set(slot_time + 100);

        let base = reveal.unwrap_or(out);
        let signature = match &self.previous_round {
            Some(previous) => OrderEngine::compute_signature(&base, previous),
            None => base,
        };

        let mut proposed = trusted.clone();
        {
            let slot = proposed.miners.get_mut(&pubkey(id)).unwrap();
            slot.previous_in_value = reveal;
            slot.out_value = Some(out);
            slot.signature = Some(signature);
            slot.implied_irreversible_block_height = implied_height;
        }

        let height = self.next_height();
        self.service.update_value(BlockConsensusMetadata {
            sender_pubkey: pubkey(id),
            behaviour: ConsensusBehaviour::UpdateValue,
            round: proposed,
            block_height: height,
        })
    }

    /// Build the proposal a correct round terminator would derive.
    pub fn derived_next_round(&self, sender_id: u8) -> Round {
        let trusted = self.current();
        let deltas = trusted.termination_counter_deltas(&pubkey(sender_id));
        let mut proposed = trusted.clone();
        proposed.round_number += 1;
        for slot in proposed.miners.values_mut() {
            let delta = deltas[&slot.pubkey];
            slot.produced_blocks += delta.produced_blocks;
            slot.missed_time_slots += delta.missed_time_slots;
        }
        proposed
    }

    pub fn terminate_round(&mut self, sender_id: u8) -> Result<(), ConsensusError> {
        let proposed = self.derived_next_round(sender_id);
        let trusted = self.current();
        self.clock.set(trusted.extra_block_mining_time(INTERVAL));
        let height = self.next_height();
        let result = self.service.next_round(BlockConsensusMetadata {
            sender_pubkey: pubkey(sender_id),
            behaviour: ConsensusBehaviour::NextRound,
            round: proposed,
            block_height: height,
        });
        if result.is_ok() {
            self.previous_round = Some(trusted);
        }
        result
    }

    pub fn terminate_term(
        &mut self,
        sender_id: u8,
        victors: &[Pubkey],
    ) -> Result<(), ConsensusError> {
        let trusted = self.current();
        let mut proposed = Round {
            round_number: trusted.round_number + 1,
            term_number: trusted.term_number + 1,
            is_miner_list_just_changed: true,
            ..Round::default()
        };
        for (i, pk) in victors.iter().enumerate() {
            proposed.miners.insert(
                *pk,
                MinerSlot::new(*pk, i as u32 + 1, trusted.extra_block_mining_time(INTERVAL)),
            );
        }
        self.clock.set(trusted.extra_block_mining_time(INTERVAL));
        let height = self.next_height();
        let result = self.service.next_term(BlockConsensusMetadata {
            sender_pubkey: pubkey(sender_id),
            behaviour: ConsensusBehaviour::NextTerm,
            round: proposed,
            block_height: height,
        });
        if result.is_ok() {
            self.previous_round = Some(trusted);
        }
        result
    }
}
