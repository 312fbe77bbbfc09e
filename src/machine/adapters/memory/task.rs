//! Deterministic task implementation for tests and local flows.

use crate::machine::{
    domain::{MachineRecord, MachineRequest, TaskError, TaskMessage},
    ports::{Task, TaskEvents},
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone)]
enum ScriptStep {
    Message(TaskMessage),
    AssignProperties(Vec<(String, Value)>),
}

/// Task that replays a fixed script of messages.
///
/// Clones share the run counter, so a test can keep a handle to a task it
/// registered with a provisioner and later check how often it ran.
#[derive(Debug, Clone)]
pub struct ScriptedTask {
    name: String,
    steps: Vec<ScriptStep>,
    failure: Option<TaskError>,
    runs: Arc<AtomicUsize>,
}

impl ScriptedTask {
    /// Creates a task that succeeds without emitting anything.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            failure: None,
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Emits a progress message.
    #[must_use]
    pub fn with_progress(mut self, message: impl Into<String>) -> Self {
        self.steps
            .push(ScriptStep::Message(TaskMessage::Progress(message.into())));
        self
    }

    /// Emits an arbitrary message.
    #[must_use]
    pub fn with_message(mut self, message: TaskMessage) -> Self {
        self.steps.push(ScriptStep::Message(message));
        self
    }

    /// Emits a state update: the inbound request with the given properties
    /// set, such as `instance_id` and `ip_address`.
    #[must_use]
    pub fn assigning<I, K, V>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.steps.push(ScriptStep::AssignProperties(
            properties
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        ));
        self
    }

    /// Makes the task return an error after replaying its script.
    #[must_use]
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(TaskError::new(message));
        self
    }

    /// Returns how many times the task has run.
    #[must_use]
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Converts the task into a shareable trait object.
    #[must_use]
    pub fn into_task(self) -> Arc<dyn Task> {
        Arc::new(self)
    }
}

#[async_trait]
impl Task for ScriptedTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        _record: MachineRecord,
        request: MachineRequest,
        events: TaskEvents,
    ) -> Result<(), TaskError> {
        self.runs.fetch_add(1, Ordering::SeqCst);

        for step in &self.steps {
            let message = match step {
                ScriptStep::Message(scripted) => scripted.clone(),
                ScriptStep::AssignProperties(properties) => {
                    let state = properties
                        .iter()
                        .fold(request.clone(), |state, (key, value)| {
                            state.with_property(key.clone(), value.clone())
                        });
                    TaskMessage::StateUpdated(state)
                }
            };
            if !events.send(message).await {
                break;
            }
        }

        self.failure.clone().map_or(Ok(()), Err)
    }
}
