//! Messaging engine abstractions consumed by the bridge.

pub mod port;
pub mod types;
