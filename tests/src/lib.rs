//! # AEDPoS Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Shared chain driver and round builders
//! │
//! └── integration/      # Multi-round and multi-term flows
//!     ├── lifecycle.rs  # Round and term progression
//!     └── finality.rs   # Irreversible-height advancement
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p aedpos-tests
//!
//! # By category
//! cargo test -p aedpos-tests integration::lifecycle::
//! cargo test -p aedpos-tests integration::finality::
//!
//! # Benchmarks
//! cargo bench -p aedpos-tests
//! ```

#![allow(dead_code)]

pub mod fixtures;
pub mod integration;
