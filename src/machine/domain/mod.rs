//! Domain model for machine lifecycle records.
//!
//! The machine domain models the persisted record (summary, event log and
//! change log), the desired-configuration request, and the messages tasks
//! emit while running. Infrastructure concerns remain outside this boundary.

mod error;
mod event;
mod ids;
mod record;
mod request;

pub use error::{MachineDomainError, ParseMachineStatusError, TaskError};
pub use event::{MachineEvent, TaskMessage, TaskOutcome};
pub use ids::{GroupId, InstanceId, MachineName, ProvisionerName};
pub use record::{MachineRecord, MachineStatus, MachineSummary};
pub use request::MachineRequest;
