//! Core abstractions for device gateways.
//!
//! - [`gateway::DeviceGateway`]: Trait every transport implements
//! - [`types`]: Odorant commands and algorithms

pub mod gateway;
pub mod types;
