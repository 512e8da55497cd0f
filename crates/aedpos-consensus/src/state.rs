//! Mutable state of the consensus core: the round history, the current
//! round pointer and the per-height application guard.

use std::collections::HashMap;

use parking_lot::RwLock;
use shared_types::Timestamp;

use crate::config::ConsensusConfig;
use crate::domain::{ConsensusError, ConsensusResult, Round};

/// Versioned store of round snapshots.
///
/// Append-only except for the entry at the current round number, which is
/// replaced wholesale on every accepted in-round transition. History stays
/// available for previous-round lookback.
pub struct RoundStore {
    rounds: HashMap<u64, Round>,
    current_round_number: u64,
}

impl RoundStore {
    pub fn new() -> Self {
        Self {
            rounds: HashMap::new(),
            current_round_number: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn current_round_number(&self) -> u64 {
        self.current_round_number
    }

    pub fn current_round(&self) -> ConsensusResult<&Round> {
        self.rounds
            .get(&self.current_round_number)
            .ok_or(ConsensusError::UnknownRound(self.current_round_number))
    }

    pub fn get_round(&self, round_number: u64) -> ConsensusResult<&Round> {
        self.rounds
            .get(&round_number)
            .ok_or(ConsensusError::UnknownRound(round_number))
    }

    pub fn previous_round(&self) -> ConsensusResult<&Round> {
        self.get_round(self.current_round_number.saturating_sub(1))
    }

    /// Replace the current round snapshot in place (same round number).
    pub fn replace_current(&mut self, round: Round) -> ConsensusResult<()> {
        if round.round_number != self.current_round_number {
            return Err(ConsensusError::StructuralMismatch(format!(
                "replace_current expected round {}, got {}",
                self.current_round_number, round.round_number
            )));
        }
        self.rounds.insert(round.round_number, round);
        Ok(())
    }

    /// Append the next round and move the current pointer to it.
    pub fn advance_to(&mut self, round: Round) -> ConsensusResult<()> {
        let expected = if self.rounds.is_empty() {
            1
        } else {
            self.current_round_number + 1
        };
        if round.round_number != expected {
            return Err(ConsensusError::StructuralMismatch(format!(
                "advance_to expected round {}, got {}",
                expected, round.round_number
            )));
        }
        self.current_round_number = round.round_number;
        self.rounds.insert(round.round_number, round);
        Ok(())
    }
}

impl Default for RoundStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Encapsulates all mutable state of the consensus service.
pub struct ConsensusState {
    pub rounds: RwLock<RoundStore>,
    config: RwLock<Option<ConsensusConfig>>,
    blockchain_start_time: RwLock<Option<Timestamp>>,
    last_applied_height: RwLock<Option<u64>>,
    term_change_successful: RwLock<bool>,
}

impl ConsensusState {
    pub fn new() -> Self {
        Self {
            rounds: RwLock::new(RoundStore::new()),
            config: RwLock::new(None),
            blockchain_start_time: RwLock::new(None),
            last_applied_height: RwLock::new(None),
            term_change_successful: RwLock::new(false),
        }
    }

    /// Install the configuration; entry points fail closed until this ran.
    pub fn initialize(&self, config: ConsensusConfig) {
        *self.config.write() = Some(config);
    }

    pub fn config(&self) -> ConsensusResult<ConsensusConfig> {
        self.config.read().clone().ok_or(ConsensusError::NotInitialized)
    }

    pub fn set_blockchain_start_time(&self, start: Timestamp) {
        *self.blockchain_start_time.write() = Some(start);
    }

    pub fn blockchain_start_time(&self) -> ConsensusResult<Timestamp> {
        self.blockchain_start_time
            .read()
            .ok_or(ConsensusError::NotInitialized)
    }

    /// Re-entrancy guard: at most one mutating transition per block height.
    pub fn mark_height_applied(&self, height: u64) -> ConsensusResult<()> {
        let mut guard = self.last_applied_height.write();
        if *guard == Some(height) {
            return Err(ConsensusError::BlockAlreadyApplied { height });
        }
        *guard = Some(height);
        Ok(())
    }

    pub fn set_term_change_successful(&self, value: bool) {
        *self.term_change_successful.write() = value;
    }

    pub fn term_change_successful(&self) -> bool {
        *self.term_change_successful.read()
    }
}

impl Default for ConsensusState {
    fn default() -> Self {
        Self::new()
    }
}
