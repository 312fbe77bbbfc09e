//! Machine events and the messages tasks emit while running.

use super::{MachineRequest, TaskError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry in a machine's event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineEvent {
    timestamp: DateTime<Utc>,
    name: String,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl MachineEvent {
    /// Creates an informational event.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            name: name.into(),
            message: message.into(),
            error: None,
        }
    }

    /// Creates an event describing a failure.
    ///
    /// The message is rendered as `failed: <error>`.
    #[must_use]
    pub fn failed(name: impl Into<String>, error: &TaskError, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            name: name.into(),
            message: format!("failed: {error}"),
            error: Some(error.message().to_owned()),
        }
    }

    /// Returns the event timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the event name, usually the task that produced it.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the error text when the event reports a failure.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns whether the event reports a failure.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Message a running task sends to the pipeline executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskMessage {
    /// Free-form progress report.
    Progress(String),
    /// Authoritative machine state became known (for example an instance
    /// identifier or IP address). The executor persists it alongside the
    /// record and hands it to the completion hook.
    StateUpdated(MachineRequest),
    /// The task changed the machine's desired configuration. The executor
    /// appends it to the record's change log.
    RequestChanged(MachineRequest),
    /// The task hit an error. The executor stops the pipeline after
    /// recording it.
    Failed(TaskError),
}

/// Final result of one task run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The task returned successfully.
    Completed,
    /// The task returned an error or panicked.
    Failed(TaskError),
}

impl TaskOutcome {
    /// Builds the wrap-up event recorded for the task.
    #[must_use]
    pub fn to_event(&self, task_name: &str, timestamp: DateTime<Utc>) -> MachineEvent {
        match self {
            Self::Completed => MachineEvent::new(task_name, "completed", timestamp),
            Self::Failed(error) => MachineEvent::failed(task_name, error, timestamp),
        }
    }

    /// Returns whether the task failed.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl From<Result<(), TaskError>> for TaskOutcome {
    fn from(result: Result<(), TaskError>) -> Self {
        match result {
            Ok(()) => Self::Completed,
            Err(error) => Self::Failed(error),
        }
    }
}
