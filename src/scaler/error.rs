//! Errors reported by the group scaler.

use crate::machine::domain::GroupId;
use thiserror::Error;

/// Errors returned by [`GroupScaler`](super::GroupScaler) state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScalerError {
    /// A reconcile loop is already running.
    #[error("already monitoring group {0}")]
    AlreadyMonitoring(GroupId),
    /// `stop` was called with no loop running.
    #[error("not monitoring any group")]
    NotMonitoring,
    /// The scaler state lock was poisoned.
    #[error("scaler state unavailable: {0}")]
    StateUnavailable(String),
    /// The reconcile loop ended abnormally.
    #[error("reconcile loop for group {group} failed: {reason}")]
    LoopFailed {
        /// Group the loop was maintaining.
        group: GroupId,
        /// Join failure description.
        reason: String,
    },
}

/// Result type for scaler operations.
pub type ScalerResult<T> = Result<T, ScalerError>;
