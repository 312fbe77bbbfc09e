//! Group-size reconciliation.
//!
//! A [`GroupScaler`] polls a [`GroupProvisioner`](crate::machine::ports::GroupProvisioner)
//! for the members of one group and drives the count toward a desired size:
//! surplus instances are destroyed in a single concurrent wave, missing ones
//! are requested in one call. Each tick is independent; errors are logged and
//! retried on the next tick.

mod error;
mod reconciler;
mod selection;

pub use error::{ScalerError, ScalerResult};
pub use reconciler::{
    DEFAULT_POLL_INTERVAL_SECS, GroupScaler, ReconcileOutcome, ScalerConfig, reconcile_once,
};
pub use selection::select_for_removal;

#[cfg(test)]
mod tests;
