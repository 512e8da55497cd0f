//! LIB Calculator: the highest block height a post-hoc supermajority of
//! miners has implicitly confirmed.

use tracing::debug;

use crate::config::ConsensusConfig;
use crate::domain::Round;

/// Stateless last-irreversible-block selection.
pub struct LibCalculator;

impl LibCalculator {
    /// Compute the new confirmed LIB height, if one can be confirmed.
    ///
    /// Reporters are the miners that published a value-bearing block in the
    /// current round; each report is the `implied_irreversible_block_height`
    /// that miner recorded in the **previous** round. With `C` reports
    /// sorted ascending and `threshold(N) = 2N/3 + 1`, the selected index is
    /// `C - threshold(N)`: the only choice for which `threshold(N)` of the
    /// `C` reporters are guaranteed to claim a height `>=` the selected
    /// value, however `C` relates to `N`.
    ///
    /// Returns `None` when the reporter count is below threshold or the
    /// candidate would move the cursor backwards (the cursor is monotonic).
    pub fn calculate(
        previous_round: &Round,
        current_round: &Round,
        confirmed_height: u64,
    ) -> Option<u64> {
        let total_miners = current_round.miner_count();
        let required = ConsensusConfig::threshold(total_miners);

        let mut heights: Vec<u64> = current_round
            .value_producers()
            .iter()
            // A producer absent from the previous round (fresh term) simply
            // has no report to contribute.
            .filter_map(|m| previous_round.get_miner(&m.pubkey))
            .map(|prev| prev.implied_irreversible_block_height)
            .filter(|h| *h > 0)
            .collect();
        heights.sort_unstable();

        let reports = heights.len();
        if reports < required {
            debug!(reports, required, "lib: not enough reporters");
            return None;
        }

        let candidate = heights[reports - required];
        if candidate < confirmed_height {
            debug!(candidate, confirmed_height, "lib: candidate below cursor");
            return None;
        }

        debug!(candidate, reports, required, "lib advanced");
        Some(candidate)
    }
}
