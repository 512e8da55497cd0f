//! Term clock: when a term ends and whether enough miners agree it has.

use shared_types::Timestamp;

use crate::config::{ChainClass, ConsensusConfig};
use crate::domain::Round;

/// End of term `term_number` on a chain started at `blockchain_start`.
/// Term `t` covers `[start + (t-1)*period, start + t*period)`.
pub fn term_boundary(
    blockchain_start: Timestamp,
    term_number: u64,
    term_period_ms: u64,
) -> Timestamp {
    blockchain_start + term_number * term_period_ms
}

/// Whether wall-clock time has passed the current term's end.
pub fn is_time_to_change_term(
    blockchain_start: Timestamp,
    term_number: u64,
    now: Timestamp,
    config: &ConsensusConfig,
) -> bool {
    if config.chain_class == ChainClass::Side {
        return false;
    }
    now >= term_boundary(blockchain_start, term_number, config.term_period_ms)
}

/// The supermajority term-change decision.
///
/// Counts miners whose most recent produced block is past the term boundary
/// **and** who published a value-bearing block this round. The value filter
/// must match the one the LIB calculator uses; counting tiny-block-only
/// miners here while LIB ignores them would open an exploitable mismatch.
pub fn term_change_threshold_met(
    round: &Round,
    blockchain_start: Timestamp,
    config: &ConsensusConfig,
) -> bool {
    if config.chain_class == ChainClass::Side {
        return false;
    }
    let (crossed, required) = term_change_progress(round, blockchain_start, config);
    crossed >= required
}

/// `(agreeing miners, required miners)` for the term-change decision.
pub fn term_change_progress(
    round: &Round,
    blockchain_start: Timestamp,
    config: &ConsensusConfig,
) -> (usize, usize) {
    let boundary = term_boundary(blockchain_start, round.term_number, config.term_period_ms);
    let crossed = round
        .miners
        .values()
        .filter(|m| m.has_published_value())
        .filter(|m| m.latest_actual_mining_time().is_some_and(|t| t >= boundary))
        .count();
    (crossed, ConsensusConfig::threshold(round.miner_count()))
}
