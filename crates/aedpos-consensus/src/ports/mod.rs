//! Ports: the inbound API driven by the execution engine and the outbound
//! dependencies the transition processor notifies.

mod inbound;
mod outbound;

pub use inbound::ConsensusApi;
pub use outbound::{
    ElectionProvider, MinerReplacementInfo, SystemTimeSource, TimeSource, TreasuryGateway,
};
