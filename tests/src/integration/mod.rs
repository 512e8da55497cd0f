//! Multi-round and multi-term flows through the public consensus API.

pub mod finality;
pub mod lifecycle;
