//! In-memory election adapter.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use shared_types::Pubkey;

use crate::ports::{ElectionProvider, MinerReplacementInfo};

/// Snapshot record kept by the in-memory election.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub term_number: u64,
    pub round_number: u64,
    pub mined_blocks: BTreeMap<Pubkey, u64>,
}

/// Candidate statistics record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateRecord {
    pub pubkey: Pubkey,
    pub produced_blocks_delta: u64,
    pub missed_slots_delta: u64,
    pub is_evil: bool,
}

/// Scriptable election collaborator that records everything it is told.
#[derive(Default)]
pub struct InMemoryElection {
    victories: RwLock<Vec<Pubkey>>,
    evil_miners: RwLock<Vec<Pubkey>>,
    alternatives: RwLock<Vec<Pubkey>>,
    snapshots: RwLock<Vec<SnapshotRecord>>,
    candidate_updates: RwLock<Vec<CandidateRecord>>,
    miners_count_updates: RwLock<Vec<usize>>,
}

impl InMemoryElection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_victories(&self, victories: Vec<Pubkey>) {
        *self.victories.write() = victories;
    }

    pub fn set_replacement(&self, evil_miners: Vec<Pubkey>, alternatives: Vec<Pubkey>) {
        *self.evil_miners.write() = evil_miners;
        *self.alternatives.write() = alternatives;
    }

    pub fn snapshots(&self) -> Vec<SnapshotRecord> {
        self.snapshots.read().clone()
    }

    pub fn candidate_updates(&self) -> Vec<CandidateRecord> {
        self.candidate_updates.read().clone()
    }

    pub fn miners_count_updates(&self) -> Vec<usize> {
        self.miners_count_updates.read().clone()
    }
}

impl ElectionProvider for InMemoryElection {
    fn get_victories(&self) -> Result<Vec<Pubkey>, String> {
        let victories = self.victories.read().clone();
        if victories.is_empty() {
            return Err("no election result available".into());
        }
        Ok(victories)
    }

    fn get_miner_replacement_information(
        &self,
        current_miners: &[Pubkey],
    ) -> Result<MinerReplacementInfo, String> {
        let evil: Vec<Pubkey> = self
            .evil_miners
            .read()
            .iter()
            .filter(|pk| current_miners.contains(pk))
            .copied()
            .collect();
        Ok(MinerReplacementInfo {
            evil_miners: evil,
            alternatives: self.alternatives.read().clone(),
        })
    }

    fn update_candidate_information(
        &self,
        pubkey: &Pubkey,
        produced_blocks_delta: u64,
        missed_slots_delta: u64,
        is_evil: bool,
    ) -> Result<(), String> {
        self.candidate_updates.write().push(CandidateRecord {
            pubkey: *pubkey,
            produced_blocks_delta,
            missed_slots_delta,
            is_evil,
        });
        Ok(())
    }

    fn update_miners_count(&self, count: usize) -> Result<(), String> {
        self.miners_count_updates.write().push(count);
        Ok(())
    }

    fn take_snapshot(
        &self,
        term_number: u64,
        round_number: u64,
        mined_blocks: BTreeMap<Pubkey, u64>,
    ) -> Result<(), String> {
        self.snapshots.write().push(SnapshotRecord {
            term_number,
            round_number,
            mined_blocks,
        });
        Ok(())
    }
}
