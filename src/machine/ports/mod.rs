//! Port contracts for machine provisioning and persistence.

mod provisioner;
mod store;

pub use provisioner::{
    GroupProvisioner, MachineEventStream, Provisioner, ProvisionerError, ProvisionerResult, Task,
    TaskEvents,
};
pub use store::{KeyValueStore, StoreError, StoreKey, StoreResult};
