//! # aedpos-consensus
//!
//! Round-based delegated BFT block-production consensus (AEDPoS): a rotating
//! miner schedule organized into rounds grouped into terms.
//!
//! ## Architecture
//!
//! For each incoming block, the execution engine extracts a
//! `(sender, behaviour, proposed round)` record, and this crate:
//!
//! 1. loads the trusted current round from the round store,
//! 2. runs the validation pipeline against the *unmutated* trusted round,
//! 3. on acceptance, has the transition processor build the new round
//!    snapshot (consulting the order engine and the LIB calculator) and
//!    swaps it in atomically,
//! 4. on rejection, returns a typed error and changes nothing.
//!
//! ```text
//! Execution engine ──metadata──→ Validation Pipeline ──accept──→ Transition Processor
//!                                       │                              │
//!                                    reject                     Order Engine,
//!                                       │                       LIB Calculator
//!                                       ↓                              │
//!                                 typed error                   Round Store swap
//! ```
//!
//! ## Trust model
//!
//! The proposed round is attacker-controlled until validated: every keyed
//! lookup into it fails closed, counters are re-derived locally instead of
//! copied, and signatures are recomputed rather than believed.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use aedpos_consensus::{ConsensusService, ConsensusDependencies, ConsensusConfig};
//! use aedpos_consensus::ports::ConsensusApi;
//!
//! let service = ConsensusService::new(ConsensusDependencies { election, treasury });
//! service.initialize(ConsensusConfig::main_chain())?;
//! service.first_round(genesis_round, 1)?;
//! service.update_value(block_metadata)?;
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod finality;
pub mod metrics;
pub mod ordering;
pub mod ports;
pub mod service;
pub mod state;
pub mod term;
pub mod validation;

// Re-export main types
pub use config::{ChainClass, ConsensusConfig};
pub use domain::{
    BlockConsensusMetadata, ConsensusBehaviour, ConsensusError, ConsensusResult, CounterDelta,
    MinerSlot, Round,
};
pub use finality::LibCalculator;
pub use ordering::{DerivedOrder, OrderEngine};
pub use ports::{ConsensusApi, ElectionProvider, TimeSource, TreasuryGateway};
pub use service::{ConsensusDependencies, ConsensusService};
pub use state::{ConsensusState, RoundStore};
