//! Shared world state for machine lifecycle BDD scenarios.

use std::sync::Arc;

use drydock::machine::{
    adapters::memory::{InMemoryProvisioner, InMemoryStore, ScriptedTask},
    domain::{MachineEvent, MachineRequest, ProvisionerName},
    ports::MachineEventStream,
    services::{
        ExecutorConfig, MachineLifecycleError, MachineLifecycleService, ProvisionerRegistry,
    },
};
use mockable::DefaultClock;
use rstest::fixture;

/// Service type used by the BDD world.
pub type TestMachineService = MachineLifecycleService<InMemoryStore, DefaultClock>;

/// Provisioner name every scenario request targets.
pub const PROVISIONER: &str = "memory";

/// Scenario world for machine lifecycle behaviour tests.
pub struct MachineLifecycleWorld {
    pub service: TestMachineService,
    pub pending_request: Option<MachineRequest>,
    pub events: Vec<MachineEvent>,
    pub last_error: Option<MachineLifecycleError>,
}

fn provisioner() -> Result<InMemoryProvisioner, eyre::Report> {
    Ok(InMemoryProvisioner::new(ProvisionerName::new(PROVISIONER)?)
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
                .failing_with("disk quota exceeded")
                .into_task(),
        )
        .with_teardown_task(ScriptedTask::new("terminate").into_task()))
}

impl MachineLifecycleWorld {
    /// Creates a world with the scenario provisioner registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the provisioner cannot be built or registered.
    pub fn new() -> Result<Self, eyre::Report> {
        let mut registry = ProvisionerRegistry::new();
        registry.register(Arc::new(provisioner()?))?;
        let service = MachineLifecycleService::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(registry),
            ExecutorConfig::default(),
            Arc::new(DefaultClock),
        );

        Ok(Self {
            service,
            pending_request: None,
            events: Vec::new(),
            last_error: None,
        })
    }

    /// Records the outcome of a create or destroy call, draining the event
    /// stream on success.
    pub fn record_outcome(&mut self, outcome: Result<MachineEventStream, MachineLifecycleError>) {
        match outcome {
            Ok(stream) => {
                self.events = run_async(collect(stream));
                self.last_error = None;
            }
            Err(err) => {
                self.events.clear();
                self.last_error = Some(err);
            }
        }
    }
}

/// Fixture that creates a new scenario world.
///
/// # Panics
///
/// Panics if the world cannot be constructed.
#[fixture]
pub fn world() -> MachineLifecycleWorld {
    MachineLifecycleWorld::new().expect("scenario world should build")
}

async fn collect(mut stream: MachineEventStream) -> Vec<MachineEvent> {
    let mut events = Vec::new();
    while let Some(event) = stream.recv().await {
        events.push(event);
    }
    events
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
