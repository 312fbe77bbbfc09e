//! Shared fixtures for in-memory machine lifecycle and scaler tests.

use std::sync::Arc;

use drydock::machine::{
    adapters::memory::{InMemoryProvisioner, InMemoryStore, ScriptedTask},
    domain::{MachineEvent, MachineName, MachineRequest, ProvisionerName},
    ports::MachineEventStream,
    services::{ExecutorConfig, MachineLifecycleService, ProvisionerRegistry},
};
use mockable::DefaultClock;
use rstest::fixture;

/// Lifecycle service type used by the integration tests.
pub type TestService = MachineLifecycleService<InMemoryStore, DefaultClock>;

/// Name of the provisioner every fixture registers.
pub const PROVISIONER: &str = "memory";

/// Message reported by the `explode` task.
pub const EXPLODE_ERROR: &str = "disk quota exceeded";

/// Builds the provisioner used across tests.
///
/// Provision tasks: `launch` (publishes instance id and address),
/// `configure`, and `explode` (always fails). Teardown tasks: `drain` and
/// `terminate`.
///
/// # Panics
///
/// Panics if the fixed provisioner name is rejected.
#[must_use]
pub fn memory_provisioner() -> InMemoryProvisioner {
    InMemoryProvisioner::new(ProvisionerName::new(PROVISIONER).expect("valid provisioner name"))
        .with_provision_task(
            ScriptedTask::new("launch")
                .with_progress("requesting instance")
                .assigning([("instance_id", "i-0abc"), ("ip_address", "10.0.0.5")])
                .into_task(),
        )
        .with_provision_task(
            ScriptedTask::new("configure")
                .with_progress("applying configuration")
                .into_task(),
        )
        .with_provision_task(
            ScriptedTask::new("explode")
                .failing_with(EXPLODE_ERROR)
                .into_task(),
        )
        .with_teardown_task(ScriptedTask::new("drain").into_task())
        .with_teardown_task(ScriptedTask::new("terminate").into_task())
}

/// Provides a lifecycle service backed by a fresh in-memory store.
///
/// # Panics
///
/// Panics if the provisioner cannot be registered.
#[fixture]
pub fn service() -> TestService {
    let mut registry = ProvisionerRegistry::new();
    registry
        .register(Arc::new(memory_provisioner()))
        .expect("registration should succeed");
    MachineLifecycleService::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(registry),
        ExecutorConfig::default(),
        Arc::new(DefaultClock),
    )
}

/// Parses a machine name.
///
/// # Panics
///
/// Panics if `name` is not a valid machine name.
#[must_use]
pub fn machine_name(name: &str) -> MachineName {
    MachineName::new(name).expect("valid machine name")
}

/// Builds a request for the shared provisioner.
///
/// # Panics
///
/// Panics if the fixed provisioner name is rejected.
#[must_use]
pub fn request(name: &str, provision: &[&str], teardown: &[&str]) -> MachineRequest {
    MachineRequest::new(
        machine_name(name),
        ProvisionerName::new(PROVISIONER).expect("valid provisioner name"),
    )
    .with_version("1")
    .with_provision_workflow(provision.iter().copied())
    .with_teardown_workflow(teardown.iter().copied())
}

/// Collects a pipeline's events until the stream closes.
pub async fn drain(mut stream: MachineEventStream) -> Vec<MachineEvent> {
    let mut events = Vec::new();
    while let Some(event) = stream.recv().await {
        events.push(event);
    }
    events
}
