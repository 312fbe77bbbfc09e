//! Step definitions for machine lifecycle scenarios.

pub mod world;

mod given;
mod then;
mod when;
