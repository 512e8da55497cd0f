//! Behaviour-specific checks for `UpdateValue` proposals.

use shared_types::hash_bytes;

use crate::domain::{ConsensusError, ConsensusResult};
use crate::ordering::OrderEngine;

use super::ValidationContext;

pub(super) fn validate(ctx: &ValidationContext<'_>) -> ConsensusResult<()> {
    let proposed_slot = ctx
        .proposed
        .get_miner(ctx.sender)
        .ok_or_else(|| ConsensusError::missing_miner(ctx.sender, "proposed round"))?;

    let out_value = proposed_slot
        .out_value
        .ok_or_else(|| ConsensusError::MalformedInput("empty out_value".into()))?;
    let signature = proposed_slot
        .signature
        .ok_or_else(|| ConsensusError::MalformedInput("empty signature".into()))?;

    // The reveal must match the commitment published in the previous round.
    if let (Some(previous_in_value), Some(previous)) =
        (proposed_slot.previous_in_value, ctx.previous)
    {
        if let Some(committed) = previous.get_miner(ctx.sender).and_then(|m| m.out_value) {
            if hash_bytes(&previous_in_value) != committed {
                return Err(ConsensusError::StructuralMismatch(
                    "previous_in_value does not hash to the committed out_value".into(),
                ));
            }
        }
    }

    // Never trust a caller-supplied signature verbatim: recompute the
    // aggregate and require an exact match, so a signature observed in an
    // earlier round cannot be replayed here.
    let base = proposed_slot.previous_in_value.unwrap_or(out_value);
    let expected_signature = match ctx.previous {
        Some(previous) => OrderEngine::compute_signature(&base, previous),
        None => base,
    };
    if signature != expected_signature {
        return Err(ConsensusError::StructuralMismatch(
            "signature does not match the recomputed aggregate".into(),
        ));
    }

    // Implied LIB claims move forward per miner and never past the block
    // being produced.
    let trusted_implied = ctx
        .trusted
        .get_miner(ctx.sender)
        .map(|m| m.implied_irreversible_block_height)
        .unwrap_or(0);
    let claimed = proposed_slot.implied_irreversible_block_height;
    if claimed < trusted_implied {
        return Err(ConsensusError::MalformedInput(format!(
            "implied irreversible height regressed: {} < {}",
            claimed, trusted_implied
        )));
    }
    if claimed > ctx.block_height {
        return Err(ConsensusError::MalformedInput(format!(
            "implied irreversible height {} beyond block height {}",
            claimed, ctx.block_height
        )));
    }

    Ok(())
}
