//! Checks applied to every behaviour, in order: mining permission, time
//! slot, continuous-block cap.

use shared_types::short_hex;

use crate::domain::{ConsensusBehaviour, ConsensusError, ConsensusResult};

use super::ValidationContext;

/// The sender must be a miner of the trusted current round.
pub(super) fn check_mining_permission(ctx: &ValidationContext<'_>) -> ConsensusResult<()> {
    if ctx.trusted.contains_miner(ctx.sender) {
        Ok(())
    } else {
        Err(ConsensusError::PermissionDenied(short_hex(ctx.sender)))
    }
}

/// The block must fall inside a window the sender is entitled to.
pub(super) fn check_time_slot(ctx: &ValidationContext<'_>) -> ConsensusResult<()> {
    let interval = ctx.config.mining_interval_ms;
    match ctx.behaviour {
        ConsensusBehaviour::UpdateValue => {
            if ctx.trusted.is_in_time_slot_of(ctx.sender, ctx.now, interval) {
                Ok(())
            } else {
                Err(ConsensusError::TimingViolation(format!(
                    "block at {} outside the sender's expected slot",
                    ctx.now
                )))
            }
        }
        ConsensusBehaviour::TinyBlock => {
            // Continuation of the sender's own slot after its value block,
            // or the previous round's extra-block producer filling the gap
            // before this round's nominal start. Nothing else qualifies;
            // anything else would let a miner inflate its block count.
            let own_slot_continuation = ctx
                .trusted
                .get_miner(ctx.sender)
                .is_some_and(|m| m.has_published_value())
                && ctx.trusted.is_in_time_slot_of(ctx.sender, ctx.now, interval);
            let pre_round_extra = ctx.trusted.extra_block_producer_of_previous_round.as_ref()
                == Some(ctx.sender)
                && ctx.now < ctx.trusted.started_at();
            if own_slot_continuation || pre_round_extra {
                Ok(())
            } else {
                Err(ConsensusError::TimingViolation(
                    "tiny block without a published value or extra-block entitlement".into(),
                ))
            }
        }
        ConsensusBehaviour::NextRound | ConsensusBehaviour::NextTerm => {
            let terminal_slot = ctx.trusted.extra_block_mining_time(interval);
            if ctx.now >= terminal_slot {
                Ok(())
            } else {
                Err(ConsensusError::TimingViolation(format!(
                    "round termination at {} before the extra-block slot at {}",
                    ctx.now, terminal_slot
                )))
            }
        }
    }
}

/// The sender must not exceed the per-slot continuous-block cap.
pub(super) fn check_continuous_blocks(ctx: &ValidationContext<'_>) -> ConsensusResult<()> {
    let Some(slot) = ctx.trusted.get_miner(ctx.sender) else {
        // Permission check already rejected unknown senders.
        return Ok(());
    };
    let interval = ctx.config.mining_interval_ms;
    // The cap is per slot. Inside the miner's own slot the window opens at
    // its expected time; a round-terminating block sits in the extra-block
    // slot; pre-round extra blocks count against the whole (still fresh)
    // round history.
    let window_start = if ctx.behaviour.is_round_transition() {
        ctx.trusted.extra_block_mining_time(interval)
    } else if ctx.trusted.is_in_time_slot_of(ctx.sender, ctx.now, interval) {
        slot.expected_mining_time
    } else {
        0
    };
    let produced = slot
        .actual_mining_times
        .iter()
        .filter(|t| **t >= window_start)
        .count() as u64;
    if produced >= ctx.config.tiny_block_limit {
        return Err(ConsensusError::TimingViolation(format!(
            "continuous block cap reached: {} of {}",
            produced, ctx.config.tiny_block_limit
        )));
    }
    Ok(())
}
