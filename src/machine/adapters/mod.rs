//! Adapter implementations for machine provisioning and persistence ports.

pub mod file;
pub mod memory;
