//! Crackwatch sensor-node firmware library.
//!
//! Exposes the node's logic for integration testing and simulation.  All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! inside each module; on the host the adapters fall back to simulated
//! backends.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod connector;
pub mod credentials;
pub mod error;
pub mod queue;
pub mod sampler;
pub mod scheduler;
pub mod session;

pub mod adapters;
pub mod drivers;
pub mod pins;
pub mod sensors;
