//! Driven ports: external collaborators of the transition processor.
//!
//! These are only ever called after a transition is accepted, and the core
//! neither retries nor rolls back on their account: a failure is surfaced
//! to the execution engine, which may abort the whole block atomically.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use shared_types::{Pubkey, Timestamp};

/// Evil-miner replacement data from the election.
///
/// `alternatives` may be shorter than `evil_miners`.
#[derive(Clone, Debug, Default)]
pub struct MinerReplacementInfo {
    pub evil_miners: Vec<Pubkey>,
    pub alternatives: Vec<Pubkey>,
}

/// The election collaborator: source of the victor list and sink for
/// per-candidate statistics.
pub trait ElectionProvider: Send + Sync {
    /// The next term's miner set, in election order.
    fn get_victories(&self) -> Result<Vec<Pubkey>, String>;

    /// Evil miners among `current_miners` plus available replacements.
    fn get_miner_replacement_information(
        &self,
        current_miners: &[Pubkey],
    ) -> Result<MinerReplacementInfo, String>;

    fn update_candidate_information(
        &self,
        pubkey: &Pubkey,
        produced_blocks_delta: u64,
        missed_slots_delta: u64,
        is_evil: bool,
    ) -> Result<(), String>;

    fn update_miners_count(&self, count: usize) -> Result<(), String>;

    fn take_snapshot(
        &self,
        term_number: u64,
        round_number: u64,
        mined_blocks: BTreeMap<Pubkey, u64>,
    ) -> Result<(), String>;
}

/// The treasury collaborator; all reward accounting is external.
pub trait TreasuryGateway: Send + Sync {
    /// Round-end donation into the reward pool.
    fn donate(&self, amount: u64) -> Result<(), String>;

    /// Term-end release of the accumulated period rewards.
    fn release(&self, period_number: u64) -> Result<(), String>;
}

/// Wall-clock abstraction so tests can drive time deterministically.
pub trait TimeSource: Send + Sync {
    fn now_ms(&self) -> Timestamp;
}

/// Production time source backed by the system clock.
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}
