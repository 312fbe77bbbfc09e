//! Drydock: machine provisioning pipelines and group scaling.
//!
//! This crate runs provider-specific provisioning and teardown tasks against
//! persisted machine records, and keeps provider-managed instance groups at a
//! desired size.
//!
//! # Architecture
//!
//! Drydock follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for provisioners and storage
//! - **Adapters**: Concrete implementations of ports (in-memory, filesystem)
//!
//! # Modules
//!
//! - [`machine`]: Task pipelines and the machine lifecycle
//! - [`scaler`]: Group-size reconciliation
//! - [`config`]: Runtime configuration

pub mod config;
pub mod machine;
pub mod scaler;
