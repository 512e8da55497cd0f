//! Behaviour-specific checks for `NextRound` and `NextTerm` proposals.
//!
//! Structural shape alone (incremented numbers, nulled values) is not
//! enough to accept a transition: the miner set, the per-miner counters and
//! the term-change threshold are each re-derived from the trusted round and
//! compared against the proposal.

use std::collections::BTreeSet;

use shared_types::Pubkey;

use crate::config::ChainClass;
use crate::domain::{ConsensusError, ConsensusResult};
use crate::term;

use super::ValidationContext;

pub(super) fn validate_next_round(ctx: &ValidationContext<'_>) -> ConsensusResult<()> {
    check_round_number(ctx)?;
    if ctx.proposed.term_number != ctx.trusted.term_number {
        return Err(ConsensusError::StructuralMismatch(format!(
            "term number changed on a round transition: {} -> {}",
            ctx.trusted.term_number, ctx.proposed.term_number
        )));
    }
    check_miner_set_unchanged(ctx)?;
    check_counter_derivation(ctx)
}

pub(super) fn validate_next_term(ctx: &ValidationContext<'_>) -> ConsensusResult<()> {
    check_round_number(ctx)?;
    if ctx.config.chain_class == ChainClass::Side {
        return Err(ConsensusError::StructuralMismatch(
            "side chains do not change terms".into(),
        ));
    }
    if ctx.proposed.term_number != ctx.trusted.term_number + 1 {
        return Err(ConsensusError::StructuralMismatch(format!(
            "expected term {}, proposal carries {}",
            ctx.trusted.term_number + 1,
            ctx.proposed.term_number
        )));
    }
    if !ctx.proposed.is_miner_list_just_changed {
        return Err(ConsensusError::StructuralMismatch(
            "first round of a term must flag the miner list change".into(),
        ));
    }

    // The threshold must hold at validation time, independently of whatever
    // shape the proposal arrived in.
    let (got, required) =
        term::term_change_progress(ctx.trusted, ctx.blockchain_start_time, ctx.config);
    if got < required {
        return Err(ConsensusError::ThresholdNotMet { got, required });
    }

    // The incoming miner set is the election's victor list, nothing else.
    let victors = ctx.expected_victors.ok_or_else(|| {
        ConsensusError::MalformedInput("term change without an election victor list".into())
    })?;
    let expected: BTreeSet<&Pubkey> = victors.iter().collect();
    let proposed: BTreeSet<&Pubkey> = ctx.proposed.miners.keys().collect();
    if expected != proposed {
        return Err(ConsensusError::StructuralMismatch(
            "proposed miner set differs from the election victors".into(),
        ));
    }

    // Cumulative counters restart with the term.
    for slot in ctx.proposed.miners.values() {
        if slot.produced_blocks != 0 || slot.missed_time_slots != 0 {
            return Err(ConsensusError::StructuralMismatch(
                "term-opening round must carry zeroed counters".into(),
            ));
        }
    }
    Ok(())
}

fn check_round_number(ctx: &ValidationContext<'_>) -> ConsensusResult<()> {
    if ctx.proposed.round_number != ctx.trusted.round_number + 1 {
        return Err(ConsensusError::StructuralMismatch(format!(
            "expected round {}, proposal carries {}",
            ctx.trusted.round_number + 1,
            ctx.proposed.round_number
        )));
    }
    Ok(())
}

/// The next round must carry exactly the trusted round's miners; same
/// count with a swapped member is still a mismatch.
fn check_miner_set_unchanged(ctx: &ValidationContext<'_>) -> ConsensusResult<()> {
    let trusted: BTreeSet<&Pubkey> = ctx.trusted.miners.keys().collect();
    let proposed: BTreeSet<&Pubkey> = ctx.proposed.miners.keys().collect();
    if trusted != proposed {
        return Err(ConsensusError::StructuralMismatch(
            "miner set changed on a round transition".into(),
        ));
    }
    Ok(())
}

/// Counters must equal the trusted value plus the locally derived
/// increment, never an arbitrary caller-supplied value.
fn check_counter_derivation(ctx: &ValidationContext<'_>) -> ConsensusResult<()> {
    let deltas = ctx.trusted.termination_counter_deltas(ctx.sender);
    for trusted_slot in ctx.trusted.miners.values() {
        let proposed_slot = ctx
            .proposed
            .get_miner(&trusted_slot.pubkey)
            .ok_or_else(|| ConsensusError::missing_miner(&trusted_slot.pubkey, "proposed round"))?;
        let delta = deltas.get(&trusted_slot.pubkey).copied().unwrap_or_default();

        let expected_blocks = trusted_slot.produced_blocks + delta.produced_blocks;
        let expected_missed = trusted_slot.missed_time_slots + delta.missed_time_slots;
        if proposed_slot.produced_blocks != expected_blocks
            || proposed_slot.missed_time_slots != expected_missed
        {
            return Err(ConsensusError::StructuralMismatch(format!(
                "counters for {} not derived from the current round",
                shared_types::short_hex(&trusted_slot.pubkey)
            )));
        }
    }
    Ok(())
}
