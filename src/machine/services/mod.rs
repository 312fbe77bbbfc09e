//! Application services for machine pipelines and lifecycle operations.

mod executor;
mod lifecycle;
mod records;
mod registry;

pub use executor::{
    CompletionHook, DEFAULT_EVENT_BUFFER, DEFAULT_TASK_EVENT_BUFFER, ExecutorConfig, RecordSaver,
    TaskExecutor,
};
pub use lifecycle::{
    MachineLifecycleError, MachineLifecycleResult, MachineLifecycleService, resolve_tasks,
};
pub use records::MachineRecordStore;
pub use registry::{ProvisionerRegistry, RegistryError};
