//! Service layer for machine create/destroy orchestration.

use super::{
    executor::{CompletionHook, ExecutorConfig, TaskExecutor},
    records::MachineRecordStore,
    registry::ProvisionerRegistry,
};
use crate::machine::{
    domain::{
        MachineDomainError, MachineEvent, MachineName, MachineRecord, MachineRequest,
        ProvisionerName,
    },
    ports::{KeyValueStore, MachineEventStream, Provisioner, StoreError, Task},
};
use async_trait::async_trait;
use mockable::Clock;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{info, warn};

/// Service-level errors for machine lifecycle operations.
#[derive(Debug, Error)]
pub enum MachineLifecycleError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] MachineDomainError),
    /// Record persistence failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The request names a provisioner that is not registered.
    #[error("unknown provisioner: {0}")]
    UnknownProvisioner(ProvisionerName),
    /// A record already exists for the machine name.
    #[error("machine {0} already exists")]
    DuplicateMachine(MachineName),
    /// No record exists for the machine name.
    #[error("machine {0} not found")]
    NotFound(MachineName),
    /// The record has no change history, so its intent is unknown.
    #[error("machine {0} is in an impossible state: no recorded changes")]
    ImpossibleState(MachineName),
    /// Another create, destroy or delete currently owns the machine.
    #[error("machine {0} is busy: another operation is in progress")]
    MachineBusy(MachineName),
    /// A workflow references a task the provisioner does not declare.
    #[error("unsupported task {task}; valid tasks: [{}]", .valid.join(", "))]
    UnknownTask {
        /// Task name from the workflow.
        task: String,
        /// Task names the provisioner declares.
        valid: Vec<String>,
    },
}

/// Result type for lifecycle service operations.
pub type MachineLifecycleResult<T> = Result<T, MachineLifecycleError>;

/// Resolves workflow task names against the tasks a provisioner declares.
///
/// The result follows workflow order. Names may repeat.
///
/// # Errors
///
/// Returns [`MachineLifecycleError::UnknownTask`] naming the first unknown
/// task and every declared task name.
pub fn resolve_tasks(
    declared: &[Arc<dyn Task>],
    workflow: &[String],
) -> MachineLifecycleResult<Vec<Arc<dyn Task>>> {
    workflow
        .iter()
        .map(|wanted| {
            declared
                .iter()
                .find(|task| task.name() == wanted)
                .cloned()
                .ok_or_else(|| MachineLifecycleError::UnknownTask {
                    task: wanted.clone(),
                    valid: declared.iter().map(|task| task.name().to_owned()).collect(),
                })
        })
        .collect()
}

/// Machine names currently owned by a running operation.
#[derive(Debug, Default)]
struct MachineClaims {
    held: Mutex<HashSet<MachineName>>,
}

impl MachineClaims {
    fn acquire(self: &Arc<Self>, name: &MachineName) -> MachineLifecycleResult<MachineClaim> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(name.clone()) {
            return Err(MachineLifecycleError::MachineBusy(name.clone()));
        }
        Ok(MachineClaim {
            claims: Arc::clone(self),
            name: name.clone(),
        })
    }
}

/// Exclusive ownership of one machine name, released on drop.
struct MachineClaim {
    claims: Arc<MachineClaims>,
    name: MachineName,
}

impl Drop for MachineClaim {
    fn drop(&mut self) {
        self.claims
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.name);
    }
}

/// Completion transition for provision pipelines.
struct ProvisionedHook<C> {
    provisioner: Arc<dyn Provisioner>,
    clock: Arc<C>,
    _claim: MachineClaim,
}

#[async_trait]
impl<C> CompletionHook for ProvisionedHook<C>
where
    C: Clock + Send + Sync,
{
    async fn on_complete(&self, record: &mut MachineRecord, state: &MachineRequest) {
        match self.provisioner.instance_id(state).await {
            Ok(instance_id) => record.set_instance_id(instance_id, &*self.clock),
            Err(err) => warn!(error = %err, "failed to resolve instance id"),
        }
        match self.provisioner.ip_address(state).await {
            Ok(ip_address) => record.set_ip_address(ip_address, &*self.clock),
            Err(err) => warn!(error = %err, "failed to resolve ip address"),
        }
        record.mark_provisioned(&*self.clock);
    }
}

/// Completion transition for teardown pipelines.
struct TerminatedHook<C> {
    clock: Arc<C>,
    _claim: MachineClaim,
}

#[async_trait]
impl<C> CompletionHook for TerminatedHook<C>
where
    C: Clock + Send + Sync,
{
    async fn on_complete(&self, record: &mut MachineRecord, _state: &MachineRequest) {
        record.mark_terminated(&*self.clock);
    }
}

/// Machine lifecycle orchestration service.
pub struct MachineLifecycleService<S, C>
where
    S: KeyValueStore,
    C: Clock + Send + Sync,
{
    records: Arc<MachineRecordStore<S>>,
    registry: Arc<ProvisionerRegistry>,
    executor: TaskExecutor<C>,
    claims: Arc<MachineClaims>,
    clock: Arc<C>,
}

impl<S, C> Clone for MachineLifecycleService<S, C>
where
    S: KeyValueStore,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            registry: Arc::clone(&self.registry),
            executor: self.executor.clone(),
            claims: Arc::clone(&self.claims),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S, C> MachineLifecycleService<S, C>
where
    S: KeyValueStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a lifecycle service.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        registry: Arc<ProvisionerRegistry>,
        config: ExecutorConfig,
        clock: Arc<C>,
    ) -> Self {
        Self {
            records: Arc::new(MachineRecordStore::new(store)),
            registry,
            executor: TaskExecutor::new(config, Arc::clone(&clock)),
            claims: Arc::new(MachineClaims::default()),
            clock,
        }
    }

    fn provisioner(&self, name: &ProvisionerName) -> MachineLifecycleResult<Arc<dyn Provisioner>> {
        self.registry
            .get(name)
            .ok_or_else(|| MachineLifecycleError::UnknownProvisioner(name.clone()))
    }

    async fn find_or_error(&self, name: &MachineName) -> MachineLifecycleResult<MachineRecord> {
        self.records
            .find(name)
            .await?
            .ok_or_else(|| MachineLifecycleError::NotFound(name.clone()))
    }

    /// Validates a request and starts its provision workflow.
    ///
    /// Validation completes before anything is persisted. The machine stays
    /// claimed until the pipeline ends. The returned stream carries the
    /// pipeline's events and closes once the record has reached
    /// `provisioned` or `failed`.
    ///
    /// # Errors
    ///
    /// Returns [`MachineLifecycleError::UnknownProvisioner`],
    /// [`MachineLifecycleError::MachineBusy`],
    /// [`MachineLifecycleError::DuplicateMachine`] or
    /// [`MachineLifecycleError::UnknownTask`] for invalid requests, or store
    /// errors when the initial record cannot be persisted.
    pub async fn create(
        &self,
        request: MachineRequest,
    ) -> MachineLifecycleResult<MachineEventStream> {
        let provisioner = self.provisioner(request.provisioner())?;
        let claim = self.claims.acquire(request.name())?;
        if self.records.find(request.name()).await?.is_some() {
            return Err(MachineLifecycleError::DuplicateMachine(
                request.name().clone(),
            ));
        }
        let tasks = resolve_tasks(&provisioner.provision_tasks(), request.provision_workflow())?;

        let mut record = MachineRecord::new(
            request.name().clone(),
            request.provisioner().clone(),
            &*self.clock,
        );
        record.append_change(request.clone(), &*self.clock);
        record.append_event(
            MachineEvent::new("create", "machine creation requested", self.clock.utc()),
            &*self.clock,
        );
        record.mark_pending(&*self.clock);
        self.records.save(&record, &request).await?;
        info!(machine = %request.name(), tasks = tasks.len(), "provisioning machine");

        let hook = ProvisionedHook {
            provisioner,
            clock: Arc::clone(&self.clock),
            _claim: claim,
        };
        Ok(self
            .executor
            .run_tasks(tasks, record, request, Arc::clone(&self.records), hook))
    }

    /// Starts the teardown workflow of an existing machine.
    ///
    /// Tasks are chosen from the most recent change and receive the last
    /// persisted machine state. The machine stays claimed until the pipeline
    /// ends, and the record is kept once terminated. A record left `pending`
    /// by an interrupted pipeline can still be torn down.
    ///
    /// # Errors
    ///
    /// Returns [`MachineLifecycleError::MachineBusy`],
    /// [`MachineLifecycleError::NotFound`],
    /// [`MachineLifecycleError::ImpossibleState`],
    /// [`MachineLifecycleError::UnknownProvisioner`] or
    /// [`MachineLifecycleError::UnknownTask`] before any work starts, or store
    /// errors.
    pub async fn destroy(&self, name: &MachineName) -> MachineLifecycleResult<MachineEventStream> {
        let claim = self.claims.acquire(name)?;
        let mut record = self.find_or_error(name).await?;
        let intent = record
            .last_change()
            .cloned()
            .ok_or_else(|| MachineLifecycleError::ImpossibleState(name.clone()))?;
        let provisioner = self.provisioner(intent.provisioner())?;
        let tasks = resolve_tasks(&provisioner.teardown_tasks(), intent.teardown_workflow())?;

        let machine_state = self
            .records
            .machine_state(name)
            .await?
            .unwrap_or_else(|| intent.clone());
        record.append_change(intent, &*self.clock);
        record.append_event(
            MachineEvent::new("destroy", "machine teardown requested", self.clock.utc()),
            &*self.clock,
        );
        record.mark_pending(&*self.clock);
        self.records.save(&record, &machine_state).await?;
        info!(machine = %name, tasks = tasks.len(), "tearing down machine");

        let hook = TerminatedHook {
            clock: Arc::clone(&self.clock),
            _claim: claim,
        };
        Ok(self.executor.run_tasks(
            tasks,
            record,
            machine_state,
            Arc::clone(&self.records),
            hook,
        ))
    }

    /// Loads a machine record.
    ///
    /// # Errors
    ///
    /// Returns store errors when the lookup fails.
    pub async fn find(&self, name: &MachineName) -> MachineLifecycleResult<Option<MachineRecord>> {
        Ok(self.records.find(name).await?)
    }

    /// Loads the last machine state a pipeline published.
    ///
    /// # Errors
    ///
    /// Returns store errors when the lookup fails.
    pub async fn machine_state(
        &self,
        name: &MachineName,
    ) -> MachineLifecycleResult<Option<MachineRequest>> {
        Ok(self.records.machine_state(name).await?)
    }

    /// Lists every machine record.
    ///
    /// # Errors
    ///
    /// Returns store errors when listing fails.
    pub async fn list(&self) -> MachineLifecycleResult<Vec<MachineRecord>> {
        Ok(self.records.list().await?)
    }

    /// Removes a machine record that no operation currently owns.
    ///
    /// The persisted status is not consulted, so records stranded in
    /// `initiated` or `pending` by an interrupted pipeline can be removed.
    ///
    /// # Errors
    ///
    /// Returns [`MachineLifecycleError::MachineBusy`],
    /// [`MachineLifecycleError::NotFound`], or store errors.
    pub async fn delete(&self, name: &MachineName) -> MachineLifecycleResult<()> {
        let _claim = self.claims.acquire(name)?;
        self.find_or_error(name).await?;
        self.records.delete(name).await?;
        info!(machine = %name, "machine record deleted");
        Ok(())
    }
}
