//! # Consensus Metrics
//!
//! Prometheus metrics for monitoring the consensus core.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! aedpos-consensus = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `consensus_transitions_accepted_total` - Counter of accepted transitions
//! - `consensus_transitions_rejected_total` - Counter of rejections (by reason)
//! - `consensus_lib_height` - Gauge of the confirmed irreversible height

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_counter_vec, register_int_counter, register_int_gauge, CounterVec, IntCounter,
    IntGauge,
};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Total transitions accepted and applied.
    pub static ref TRANSITIONS_ACCEPTED: IntCounter = register_int_counter!(
        "consensus_transitions_accepted_total",
        "Total number of accepted round transitions"
    )
    .expect("Failed to create TRANSITIONS_ACCEPTED metric");

    /// Total transitions rejected, labeled by rejection reason.
    pub static ref TRANSITIONS_REJECTED: CounterVec = register_counter_vec!(
        "consensus_transitions_rejected_total",
        "Total number of rejected round transitions",
        &["reason"]
    )
    .expect("Failed to create TRANSITIONS_REJECTED metric");

    /// Latest confirmed last-irreversible-block height.
    pub static ref LIB_HEIGHT: IntGauge = register_int_gauge!(
        "consensus_lib_height",
        "Confirmed last irreversible block height"
    )
    .expect("Failed to create LIB_HEIGHT metric");
}

#[cfg(feature = "metrics")]
pub fn record_acceptance() {
    TRANSITIONS_ACCEPTED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_rejection(reason: &str) {
    TRANSITIONS_REJECTED.with_label_values(&[reason]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_lib_height(height: u64) {
    LIB_HEIGHT.set(height as i64);
}

#[cfg(not(feature = "metrics"))]
pub fn record_acceptance() {}

#[cfg(not(feature = "metrics"))]
pub fn record_rejection(_reason: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_lib_height(_height: u64) {}
