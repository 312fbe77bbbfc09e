//! In-memory provisioner adapter.

use crate::machine::{
    domain::{GroupId, InstanceId, MachineEvent, MachineRequest, ProvisionerName},
    ports::{
        GroupProvisioner, MachineEventStream, Provisioner, ProvisionerError, ProvisionerResult,
        Task,
    },
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Request property naming the group a created instance joins.
pub const GROUP_PROPERTY: &str = "group";
/// Machine state property holding the instance identifier.
pub const INSTANCE_ID_PROPERTY: &str = "instance_id";
/// Machine state property holding the IP address.
pub const IP_ADDRESS_PROPERTY: &str = "ip_address";

/// In-memory provisioner.
///
/// Machine-level lookups read the `instance_id` and `ip_address` properties
/// that tasks publish through state updates. Group membership is kept in
/// memory without provisioning anything real, which makes the adapter
/// suitable for tests and deterministic local orchestration.
#[derive(Clone)]
pub struct InMemoryProvisioner {
    name: ProvisionerName,
    provision_tasks: Vec<Arc<dyn Task>>,
    teardown_tasks: Vec<Arc<dyn Task>>,
    state: Arc<RwLock<InMemoryGroupState>>,
}

#[derive(Debug, Default)]
struct InMemoryGroupState {
    groups: BTreeMap<GroupId, BTreeSet<InstanceId>>,
    failing_destroys: HashSet<InstanceId>,
    destroyed: Vec<InstanceId>,
}

impl fmt::Debug for InMemoryProvisioner {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("InMemoryProvisioner")
            .field("name", &self.name)
            .field("provision_tasks", &task_names(&self.provision_tasks))
            .field("teardown_tasks", &task_names(&self.teardown_tasks))
            .finish_non_exhaustive()
    }
}

fn task_names(tasks: &[Arc<dyn Task>]) -> Vec<&str> {
    tasks.iter().map(|task| task.name()).collect()
}

fn lock_error(err: impl fmt::Display) -> ProvisionerError {
    ProvisionerError::runtime(std::io::Error::other(err.to_string()))
}

fn event_stream(events: Vec<MachineEvent>) -> MachineEventStream {
    let (sender, receiver) = mpsc::channel(events.len().max(1));
    for event in events {
        if sender.try_send(event).is_err() {
            break;
        }
    }
    receiver
}

fn allocate_instance_id() -> ProvisionerResult<InstanceId> {
    InstanceId::new(format!("i-{}", Uuid::new_v4().simple())).map_err(ProvisionerError::runtime)
}

impl InMemoryProvisioner {
    /// Creates a provisioner with no tasks and no groups.
    #[must_use]
    pub fn new(name: ProvisionerName) -> Self {
        Self {
            name,
            provision_tasks: Vec::new(),
            teardown_tasks: Vec::new(),
            state: Arc::new(RwLock::new(InMemoryGroupState::default())),
        }
    }

    /// Declares a task that provision workflows may reference.
    #[must_use]
    pub fn with_provision_task(mut self, task: Arc<dyn Task>) -> Self {
        self.provision_tasks.push(task);
        self
    }

    /// Declares a task that teardown workflows may reference.
    #[must_use]
    pub fn with_teardown_task(mut self, task: Arc<dyn Task>) -> Self {
        self.teardown_tasks.push(task);
        self
    }

    /// Replaces the members of a group.
    ///
    /// # Errors
    ///
    /// Returns provisioner runtime errors when lock acquisition fails.
    pub fn set_group_instances(
        &self,
        group: GroupId,
        instances: impl IntoIterator<Item = InstanceId>,
    ) -> ProvisionerResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.groups.insert(group, instances.into_iter().collect());
        Ok(())
    }

    /// Makes every future destroy of `instance` fail.
    ///
    /// # Errors
    ///
    /// Returns provisioner runtime errors when lock acquisition fails.
    pub fn fail_destroy(&self, instance: InstanceId) -> ProvisionerResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.failing_destroys.insert(instance);
        Ok(())
    }

    /// Returns every instance destroyed so far, in destroy order.
    ///
    /// # Errors
    ///
    /// Returns provisioner runtime errors when lock acquisition fails.
    pub fn destroyed(&self) -> ProvisionerResult<Vec<InstanceId>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.destroyed.clone())
    }
}

#[async_trait]
impl Provisioner for InMemoryProvisioner {
    fn name(&self) -> &ProvisionerName {
        &self.name
    }

    fn provision_tasks(&self) -> Vec<Arc<dyn Task>> {
        self.provision_tasks.clone()
    }

    fn teardown_tasks(&self) -> Vec<Arc<dyn Task>> {
        self.teardown_tasks.clone()
    }

    async fn instance_id(&self, state: &MachineRequest) -> ProvisionerResult<InstanceId> {
        let raw = state.property_str(INSTANCE_ID_PROPERTY).ok_or_else(|| {
            ProvisionerError::MissingAttribute {
                machine: state.name().to_string(),
                attribute: INSTANCE_ID_PROPERTY,
            }
        })?;
        InstanceId::new(raw).map_err(ProvisionerError::runtime)
    }

    async fn ip_address(&self, state: &MachineRequest) -> ProvisionerResult<String> {
        state
            .property_str(IP_ADDRESS_PROPERTY)
            .map(ToOwned::to_owned)
            .ok_or_else(|| ProvisionerError::MissingAttribute {
                machine: state.name().to_string(),
                attribute: IP_ADDRESS_PROPERTY,
            })
    }
}

#[async_trait]
impl GroupProvisioner for InMemoryProvisioner {
    async fn create_instance(
        &self,
        request: &MachineRequest,
    ) -> ProvisionerResult<MachineEventStream> {
        let instance = allocate_instance_id()?;
        let group = request
            .property_str(GROUP_PROPERTY)
            .map(GroupId::new)
            .transpose()
            .map_err(ProvisionerError::runtime)?;

        if let Some(group_id) = group {
            let mut state = self.state.write().map_err(lock_error)?;
            state
                .groups
                .entry(group_id)
                .or_default()
                .insert(instance.clone());
        }

        Ok(event_stream(vec![MachineEvent::new(
            "create-instance",
            format!("instance {instance} created for {}", request.name()),
            Utc::now(),
        )]))
    }

    async fn destroy_instance(
        &self,
        instance: &InstanceId,
    ) -> ProvisionerResult<MachineEventStream> {
        let mut state = self.state.write().map_err(lock_error)?;
        if state.failing_destroys.contains(instance) {
            return Err(ProvisionerError::runtime(std::io::Error::other(format!(
                "destroy of {instance} rejected by provider"
            ))));
        }

        let mut removed = false;
        for members in state.groups.values_mut() {
            removed |= members.remove(instance);
        }
        if !removed {
            return Err(ProvisionerError::UnknownInstance(instance.clone()));
        }
        state.destroyed.push(instance.clone());

        Ok(event_stream(vec![
            MachineEvent::new("destroy-instance", format!("terminating {instance}"), Utc::now()),
            MachineEvent::new("destroy-instance", "completed", Utc::now()),
        ]))
    }

    async fn instances(&self, group: &GroupId) -> ProvisionerResult<Vec<InstanceId>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state
            .groups
            .get(group)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn add_group_instances(&self, group: &GroupId, count: u32) -> ProvisionerResult<()> {
        let mut allocated = Vec::new();
        for _ in 0..count {
            allocated.push(allocate_instance_id()?);
        }
        let mut state = self.state.write().map_err(lock_error)?;
        state
            .groups
            .entry(group.clone())
            .or_default()
            .extend(allocated);
        Ok(())
    }
}
