//! Error types for machine domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing machine domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MachineDomainError {
    /// The machine name is empty after trimming.
    #[error("machine name must not be empty")]
    EmptyMachineName,

    /// The machine name contains characters that cannot form a storage key.
    #[error(
        "machine name '{0}' contains invalid characters (only alphanumeric, '-', '_' and '.' allowed)"
    )]
    InvalidMachineName(String),

    /// The machine name exceeds the 253-character limit.
    #[error("machine name exceeds 253 character limit: {0}")]
    MachineNameTooLong(String),

    /// The provisioner name is empty after trimming.
    #[error("provisioner name must not be empty")]
    EmptyProvisionerName,

    /// The instance identifier is empty after trimming.
    #[error("instance identifier must not be empty")]
    EmptyInstanceId,

    /// The group identifier is empty after trimming.
    #[error("group identifier must not be empty")]
    EmptyGroupId,
}

/// Error returned while parsing a machine status from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown machine status: {0}")]
pub struct ParseMachineStatusError(pub String);

/// Failure reported by a provisioning task.
///
/// Task errors travel inside events and persisted records, so they carry a
/// rendered message rather than a live error source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct TaskError(String);

impl TaskError {
    /// Creates a task error from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// Renders any error into a task error.
    #[must_use]
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        Self(err.to_string())
    }

    /// Returns the rendered error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.0
    }
}
