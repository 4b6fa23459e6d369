//! Application core: orchestration and the port boundary.
//!
//! [`service::NodeService`] sequences the node's components each loop
//! iteration.  All interaction with hardware happens through the **port
//! traits** in [`ports`], so this layer is fully testable without real
//! peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
