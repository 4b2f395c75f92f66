//! Core of the messaging client bridge.
//!
//! Exposes a typed, async messaging client to a host that only speaks untyped
//! JSON values and single-shot callbacks. The messaging engine itself lives behind
//! the ports in [`messaging::port`]; this crate owns translation, dispatch and
//! result encoding.

pub mod bridge;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod messaging;

pub use errors::{Error, Result};
