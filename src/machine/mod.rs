//! Machine provisioning: task pipelines and machine lifecycle records.
//!
//! A machine is described by a [`domain::MachineRequest`] and tracked through
//! a persisted [`domain::MachineRecord`]. Provisioners contribute named tasks;
//! the lifecycle service resolves a request's workflow into those tasks and
//! the executor runs them in order, persisting every event before it reaches
//! the caller. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
