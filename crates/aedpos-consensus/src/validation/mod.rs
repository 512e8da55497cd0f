//! Validation pipeline: an ordered chain of checks, selected by claimed
//! behaviour, run strictly against the trusted, unmodified current round.
//!
//! The pipeline is a pure function of its context. It holds shared
//! references only; any merged view needed for inspection is a private
//! clone, never an in-place mutation of the trusted round. It performs no
//! collaborator I/O; the expected victor list for a term change is
//! fetched by the caller and passed in as plain data.

mod common;
mod round_transition;
mod update_value;

use shared_types::{Pubkey, Timestamp};

use crate::config::ConsensusConfig;
use crate::domain::{ConsensusBehaviour, ConsensusResult, Round};

/// Everything a validation run may look at.
pub struct ValidationContext<'a> {
    /// The trusted current round. Never mutated here.
    pub trusted: &'a Round,
    /// The trusted previous round, when one exists.
    pub previous: Option<&'a Round>,
    /// The caller-supplied proposal. Untrusted; keyed lookups fail closed.
    pub proposed: &'a Round,
    pub sender: &'a Pubkey,
    pub behaviour: ConsensusBehaviour,
    pub now: Timestamp,
    pub block_height: u64,
    pub config: &'a ConsensusConfig,
    pub blockchain_start_time: Timestamp,
    /// The election victor list, present only for `NextTerm` proposals.
    pub expected_victors: Option<&'a [Pubkey]>,
}

/// Runs the check chain, short-circuiting on the first failure.
pub struct ValidationPipeline;

impl ValidationPipeline {
    pub fn validate(ctx: &ValidationContext<'_>) -> ConsensusResult<()> {
        common::check_mining_permission(ctx)?;
        common::check_time_slot(ctx)?;
        common::check_continuous_blocks(ctx)?;

        match ctx.behaviour {
            ConsensusBehaviour::UpdateValue => update_value::validate(ctx),
            // Tiny-block gating is fully covered by the time-slot and
            // continuous-block checks above.
            ConsensusBehaviour::TinyBlock => Ok(()),
            ConsensusBehaviour::NextRound => round_transition::validate_next_round(ctx),
            ConsensusBehaviour::NextTerm => round_transition::validate_next_term(ctx),
        }
    }
}
