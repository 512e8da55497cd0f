//! # Shared Types Crate
//!
//! Primitive types shared by the consensus core and the surrounding
//! execution engine.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every cross-crate primitive (hashes,
//!   public keys, timestamps) is defined here, once.
//! - **Plain data**: all types are `Copy`-friendly byte arrays or integers;
//!   no behaviour beyond construction and hashing.

pub mod entities;

pub use entities::*;
