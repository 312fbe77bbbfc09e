//! Task pipeline executor.
//!
//! [`TaskExecutor::run_tasks`] drives an ordered task list against one
//! machine record. It returns the receiving half of an event stream at once
//! and does all work on a background tokio task that owns the record until
//! the pipeline ends. Every event is persisted through a [`RecordSaver`]
//! before it is forwarded, so a consumer that has seen an event can rely on
//! the store holding it.

use crate::machine::{
    domain::{MachineEvent, MachineRecord, MachineRequest, TaskError, TaskMessage, TaskOutcome},
    ports::{MachineEventStream, StoreResult, Task, TaskEvents},
};
use async_trait::async_trait;
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Default capacity of the per-task message queue.
pub const DEFAULT_TASK_EVENT_BUFFER: usize = 1;
/// Default capacity of the outbound event stream.
pub const DEFAULT_EVENT_BUFFER: usize = 1;

/// Channel sizing for pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Capacity of the queue between a running task and the executor.
    pub task_event_buffer: usize,
    /// Capacity of the event stream returned to the caller.
    pub event_buffer: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            task_event_buffer: DEFAULT_TASK_EVENT_BUFFER,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

/// Persists a record together with the latest machine state.
#[async_trait]
pub trait RecordSaver: Send + Sync {
    /// Persists the record and state.
    ///
    /// # Errors
    ///
    /// Returns store errors; the executor logs them and carries on.
    async fn save(&self, record: &MachineRecord, state: &MachineRequest) -> StoreResult<()>;
}

/// Transition applied once every task in a pipeline has succeeded.
///
/// The executor drops the hook, whether or not it ran, before closing the
/// event stream.
#[async_trait]
pub trait CompletionHook: Send + Sync {
    /// Updates the record after the last task. The executor persists the
    /// record afterwards.
    async fn on_complete(&self, record: &mut MachineRecord, state: &MachineRequest);
}

/// Runs task pipelines for machine records.
#[derive(Debug)]
pub struct TaskExecutor<C>
where
    C: Clock + Send + Sync,
{
    config: ExecutorConfig,
    clock: Arc<C>,
}

impl<C> Clone for TaskExecutor<C>
where
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C> TaskExecutor<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Creates an executor.
    #[must_use]
    pub const fn new(config: ExecutorConfig, clock: Arc<C>) -> Self {
        Self { config, clock }
    }

    /// Returns the channel sizing in use.
    #[must_use]
    pub const fn config(&self) -> ExecutorConfig {
        self.config
    }

    /// Starts a pipeline and returns its event stream.
    ///
    /// Tasks run strictly in order. Each receives a copy of the record as it
    /// stood when the task started and the original `request`. The first
    /// failure marks the record failed and ends the pipeline; otherwise
    /// `hook` runs after the last task. The stream closes once the final
    /// record has been persisted. Dropping the stream does not cancel the
    /// pipeline.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use = "the stream carries the pipeline's events"]
    pub fn run_tasks<S, H>(
        &self,
        tasks: Vec<Arc<dyn Task>>,
        record: MachineRecord,
        request: MachineRequest,
        saver: Arc<S>,
        hook: H,
    ) -> MachineEventStream
    where
        S: RecordSaver + ?Sized + 'static,
        H: CompletionHook + 'static,
    {
        let (sender, receiver) = mpsc::channel(self.config.event_buffer.max(1));
        let span = info_span!(
            "machine_pipeline",
            machine = %record.machine_name(),
            tasks = tasks.len(),
        );
        let pipeline = Pipeline {
            clock: Arc::clone(&self.clock),
            saver,
            sender,
            task_event_buffer: self.config.task_event_buffer.max(1),
            record,
            machine_state: request.clone(),
            request,
        };
        tokio::spawn(pipeline.run(tasks, hook).instrument(span));
        receiver
    }
}

struct Pipeline<C, S: ?Sized> {
    clock: Arc<C>,
    saver: Arc<S>,
    sender: mpsc::Sender<MachineEvent>,
    task_event_buffer: usize,
    record: MachineRecord,
    request: MachineRequest,
    machine_state: MachineRequest,
}

impl<C, S> Pipeline<C, S>
where
    C: Clock + Send + Sync + 'static,
    S: RecordSaver + ?Sized + 'static,
{
    async fn run<H: CompletionHook>(mut self, tasks: Vec<Arc<dyn Task>>, hook: H) {
        info!("pipeline started");
        if self.run_all(tasks).await {
            hook.on_complete(&mut self.record, &self.machine_state).await;
            self.persist().await;
            info!(status = %self.record.status(), "pipeline finished");
        } else {
            self.record.mark_failed(&*self.clock);
            self.persist().await;
            info!(status = %self.record.status(), "pipeline stopped after failure");
        }
        // The sender, and with it the stream, closes after the hook is gone.
        drop(hook);
    }

    /// Runs every task in order, stopping at the first failure.
    async fn run_all(&mut self, tasks: Vec<Arc<dyn Task>>) -> bool {
        for task in tasks {
            if !self.run_task(task).await {
                return false;
            }
        }
        true
    }

    /// Runs one task and reports whether it succeeded.
    async fn run_task(&mut self, task: Arc<dyn Task>) -> bool {
        let task_name = task.name().to_owned();
        self.record.mark_pending(&*self.clock);
        self.persist().await;
        debug!(task = %task_name, "task started");

        let (message_sender, mut messages) = mpsc::channel(self.task_event_buffer);
        let snapshot = self.record.clone();
        let request = self.request.clone();
        let handle = tokio::spawn(async move {
            task.run(snapshot, request, TaskEvents::new(message_sender))
                .await
        });

        while let Some(message) = messages.recv().await {
            let (event, stop) = self.interpret(&task_name, message);
            self.emit(event).await;
            if stop {
                // The task keeps running detached; its further sends fail.
                return false;
            }
        }

        let outcome = match handle.await {
            Ok(result) => TaskOutcome::from(result),
            Err(err) => {
                error!(task = %task_name, error = %err, "task aborted");
                TaskOutcome::Failed(TaskError::new("task panicked"))
            }
        };
        self.emit(outcome.to_event(&task_name, self.clock.utc()))
            .await;
        !outcome.is_failure()
    }

    /// Applies a task message to the pipeline state and returns the event to
    /// record plus whether the pipeline must stop.
    fn interpret(&mut self, task_name: &str, message: TaskMessage) -> (MachineEvent, bool) {
        let timestamp = self.clock.utc();
        match message {
            TaskMessage::Progress(text) => (MachineEvent::new(task_name, text, timestamp), false),
            TaskMessage::StateUpdated(state) => {
                self.machine_state = state;
                (
                    MachineEvent::new(task_name, "machine state updated", timestamp),
                    false,
                )
            }
            TaskMessage::RequestChanged(changed) => {
                self.record.append_change(changed, &*self.clock);
                (
                    MachineEvent::new(task_name, "request changed", timestamp),
                    false,
                )
            }
            TaskMessage::Failed(task_error) => {
                (MachineEvent::failed(task_name, &task_error, timestamp), true)
            }
        }
    }

    async fn emit(&mut self, event: MachineEvent) {
        self.record.append_event(event.clone(), &*self.clock);
        self.persist().await;
        debug!(task = %event.name(), message = %event.message(), "event recorded");
        if self.sender.send(event).await.is_err() {
            debug!("event stream consumer has gone away");
        }
    }

    async fn persist(&self) {
        if let Err(err) = self.saver.save(&self.record, &self.machine_state).await {
            warn!(error = %err, "failed to persist machine record");
        }
    }
}
