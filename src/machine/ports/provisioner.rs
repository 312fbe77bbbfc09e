//! Provisioner plugin contract: tasks, instance lookups and group operations.

use crate::machine::domain::{
    GroupId, InstanceId, MachineEvent, MachineRecord, MachineRequest, ProvisionerName, TaskError,
    TaskMessage,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Stream of machine events, closed by the producer when it is done.
pub type MachineEventStream = mpsc::Receiver<MachineEvent>;

/// Result type for provisioner operations.
pub type ProvisionerResult<T> = Result<T, ProvisionerError>;

/// Sending half handed to a running task.
///
/// Sends never fail loudly: once the executor has stopped listening (for
/// example after an earlier failure message), further messages are dropped
/// and the send reports `false`.
#[derive(Debug, Clone)]
pub struct TaskEvents {
    sender: mpsc::Sender<TaskMessage>,
}

impl TaskEvents {
    /// Wraps the executor-side sender.
    #[must_use]
    pub const fn new(sender: mpsc::Sender<TaskMessage>) -> Self {
        Self { sender }
    }

    /// Sends a message, returning whether the executor received it.
    pub async fn send(&self, message: TaskMessage) -> bool {
        self.sender.send(message).await.is_ok()
    }

    /// Reports progress.
    pub async fn progress(&self, message: impl Into<String>) -> bool {
        self.send(TaskMessage::Progress(message.into())).await
    }

    /// Publishes authoritative machine state.
    pub async fn state_updated(&self, state: MachineRequest) -> bool {
        self.send(TaskMessage::StateUpdated(state)).await
    }

    /// Publishes a change of desired configuration.
    pub async fn request_changed(&self, request: MachineRequest) -> bool {
        self.send(TaskMessage::RequestChanged(request)).await
    }

    /// Reports a failure, which stops the pipeline.
    pub async fn fail(&self, error: TaskError) -> bool {
        self.send(TaskMessage::Failed(error)).await
    }
}

/// A named unit of provider-specific provisioning or teardown work.
///
/// Tasks are stateless function objects bound to a provisioner. The executor
/// only looks at the name, the returned result, and the emitted messages.
#[async_trait]
pub trait Task: Send + Sync {
    /// Returns the name used to reference the task from a workflow.
    fn name(&self) -> &str;

    /// Runs the task against a snapshot of the machine record.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] when the work fails; the pipeline stops and the
    /// record is marked failed.
    async fn run(
        &self,
        record: MachineRecord,
        request: MachineRequest,
        events: TaskEvents,
    ) -> Result<(), TaskError>;
}

/// Machine-level provisioner contract.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Returns the name requests use to select this provisioner.
    fn name(&self) -> &ProvisionerName;

    /// Returns every task a provision workflow may reference.
    fn provision_tasks(&self) -> Vec<Arc<dyn Task>>;

    /// Returns every task a teardown workflow may reference.
    fn teardown_tasks(&self) -> Vec<Arc<dyn Task>>;

    /// Resolves the provider instance identifier for a machine.
    async fn instance_id(&self, state: &MachineRequest) -> ProvisionerResult<InstanceId>;

    /// Resolves the IP address for a machine.
    async fn ip_address(&self, state: &MachineRequest) -> ProvisionerResult<String>;
}

/// Group-level instance operations used by the scaler.
#[async_trait]
pub trait GroupProvisioner: Send + Sync {
    /// Creates one instance and streams its progress.
    async fn create_instance(&self, request: &MachineRequest)
    -> ProvisionerResult<MachineEventStream>;

    /// Destroys one instance and streams its progress.
    async fn destroy_instance(&self, instance: &InstanceId)
    -> ProvisionerResult<MachineEventStream>;

    /// Lists the current members of a group.
    async fn instances(&self, group: &GroupId) -> ProvisionerResult<Vec<InstanceId>>;

    /// Requests `count` additional members for a group without waiting for
    /// them to appear.
    async fn add_group_instances(&self, group: &GroupId, count: u32) -> ProvisionerResult<()>;
}

/// Errors returned by provisioner adapters.
#[derive(Debug, Clone, Error)]
pub enum ProvisionerError {
    /// The instance is unknown to the provider.
    #[error("unknown instance: {0}")]
    UnknownInstance(InstanceId),

    /// The machine state does not carry the requested attribute yet.
    #[error("machine state has no {attribute} for {machine}")]
    MissingAttribute {
        /// Machine the lookup was made for.
        machine: String,
        /// Attribute that is missing.
        attribute: &'static str,
    },

    /// An operation's event stream reported a failure.
    #[error("{operation} of {instance} reported failure: {reason}")]
    Reported {
        /// Operation that produced the stream.
        operation: &'static str,
        /// Instance the operation targeted.
        instance: InstanceId,
        /// Error text carried by the event.
        reason: String,
    },

    /// Generic provider failure.
    #[error("provisioner runtime error: {0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl ProvisionerError {
    /// Wraps a provider runtime error.
    pub fn runtime(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime(Arc::new(err))
    }
}
