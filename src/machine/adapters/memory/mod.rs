//! In-memory adapters for stores, provisioners and tasks.

mod provisioner;
mod store;
mod task;

pub use provisioner::{
    GROUP_PROPERTY, INSTANCE_ID_PROPERTY, IP_ADDRESS_PROPERTY, InMemoryProvisioner,
};
pub use store::InMemoryStore;
pub use task::ScriptedTask;
