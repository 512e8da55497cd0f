//! Error types for the consensus core.

use shared_types::Pubkey;

/// Consensus error taxonomy.
///
/// Every validation failure is recoverable at the block level: the block is
/// rejected, no state is mutated, and the kind plus message reach the
/// execution engine for diagnostics. `InvariantViolation` is the one fatal
/// class: it is raised after acceptance, and the execution engine must
/// discard the whole block's state delta.
#[derive(Debug, thiserror::Error)]
pub enum ConsensusError {
    #[error("sender is not a miner of the current round: {0}")]
    PermissionDenied(String),

    #[error("timing violation: {0}")]
    TimingViolation(String),

    #[error("structural mismatch: {0}")]
    StructuralMismatch(String),

    #[error("threshold not met: got {got}, required {required}")]
    ThresholdNotMet { got: usize, required: usize },

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("consensus core used before initialize()")]
    NotInitialized,

    #[error("a transition was already applied at block height {height}")]
    BlockAlreadyApplied { height: u64 },

    #[error("unknown round number: {0}")]
    UnknownRound(u64),

    #[error("collaborator call failed: {0}")]
    CollaboratorFailure(String),

    #[error("invariant violation after acceptance: {0}")]
    InvariantViolation(String),
}

impl ConsensusError {
    /// Fatal errors require the execution engine to discard the entire
    /// block delta rather than merely reject the block.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConsensusError::InvariantViolation(_))
    }

    /// Stable label for rejection metrics.
    pub fn reason_label(&self) -> &'static str {
        match self {
            ConsensusError::PermissionDenied(_) => "permission_denied",
            ConsensusError::TimingViolation(_) => "timing_violation",
            ConsensusError::StructuralMismatch(_) => "structural_mismatch",
            ConsensusError::ThresholdNotMet { .. } => "threshold_not_met",
            ConsensusError::MalformedInput(_) => "malformed_input",
            ConsensusError::NotInitialized => "not_initialized",
            ConsensusError::BlockAlreadyApplied { .. } => "already_applied",
            ConsensusError::UnknownRound(_) => "unknown_round",
            ConsensusError::CollaboratorFailure(_) => "collaborator_failure",
            ConsensusError::InvariantViolation(_) => "invariant_violation",
        }
    }

    /// Convenience constructor for the recurring "sender missing from a
    /// caller-supplied map" rejection.
    pub fn missing_miner(pubkey: &Pubkey, where_: &str) -> Self {
        ConsensusError::MalformedInput(format!(
            "miner {} absent from {}",
            shared_types::short_hex(pubkey),
            where_
        ))
    }
}

/// Result type for consensus operations.
pub type ConsensusResult<T> = Result<T, ConsensusError>;
