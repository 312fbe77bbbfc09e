//! Periodic reconcile loop and the single-tick reconcile step.

use super::{
    error::{ScalerError, ScalerResult},
    selection::select_for_removal,
};
use crate::machine::{
    domain::{GroupId, InstanceId},
    ports::{GroupProvisioner, ProvisionerError, ProvisionerResult},
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Default seconds between reconcile ticks.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Reconcile loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalerConfig {
    /// Seconds between reconcile ticks; zero is treated as one.
    pub poll_interval_secs: u64,
}

impl Default for ScalerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl ScalerConfig {
    /// Returns the tick period.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

/// What one reconcile tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The group already had the desired size.
    Steady,
    /// Additional members were requested.
    ScaledUp {
        /// Number of members requested.
        requested: u32,
    },
    /// A destroy wave ran to completion.
    ScaledDown {
        /// Instances destroyed, sorted.
        destroyed: Vec<InstanceId>,
        /// Instances whose destroy failed, sorted.
        failed: Vec<InstanceId>,
    },
    /// The provider could not be queried or rejected the scale-up.
    Skipped,
}

/// Runs one reconcile step for `group`.
///
/// Surplus members are chosen with [`select_for_removal`] and destroyed
/// concurrently; the call returns only after every destroy in the wave has
/// finished and its event stream has been drained. Missing members are
/// requested with a single [`GroupProvisioner::add_group_instances`] call
/// that does not wait for them to appear.
pub async fn reconcile_once<P>(provisioner: &Arc<P>, group: &GroupId, desired: u32) -> ReconcileOutcome
where
    P: GroupProvisioner + ?Sized + 'static,
{
    let instances = match provisioner.instances(group).await {
        Ok(instances) => instances,
        Err(err) => {
            warn!(error = %err, "failed to list group instances, skipping tick");
            return ReconcileOutcome::Skipped;
        }
    };
    let actual = u32::try_from(instances.len()).unwrap_or(u32::MAX);

    match actual.cmp(&desired) {
        Ordering::Equal => ReconcileOutcome::Steady,
        Ordering::Greater => {
            let surplus = usize::try_from(actual.saturating_sub(desired)).unwrap_or(usize::MAX);
            info!(actual, desired, surplus, "scaling group down");
            destroy_wave(provisioner, select_for_removal(&instances, surplus)).await
        }
        Ordering::Less => {
            let missing = desired.saturating_sub(actual);
            info!(actual, desired, missing, "scaling group up");
            match provisioner.add_group_instances(group, missing).await {
                Ok(()) => ReconcileOutcome::ScaledUp { requested: missing },
                Err(err) => {
                    warn!(error = %err, "failed to request group instances");
                    ReconcileOutcome::Skipped
                }
            }
        }
    }
}

async fn destroy_wave<P>(provisioner: &Arc<P>, victims: Vec<InstanceId>) -> ReconcileOutcome
where
    P: GroupProvisioner + ?Sized + 'static,
{
    let mut wave = JoinSet::new();
    for instance in victims {
        let destroyer = Arc::clone(provisioner);
        wave.spawn(async move {
            let result = destroy_and_drain(destroyer.as_ref(), &instance).await;
            (instance, result)
        });
    }

    let mut destroyed = Vec::new();
    let mut failed = Vec::new();
    while let Some(joined) = wave.join_next().await {
        match joined {
            Ok((instance, Ok(()))) => {
                info!(instance = %instance, "instance destroyed");
                destroyed.push(instance);
            }
            Ok((instance, Err(err))) => {
                warn!(instance = %instance, error = %err, "failed to destroy instance");
                failed.push(instance);
            }
            Err(err) => error!(error = %err, "destroy task aborted"),
        }
    }
    destroyed.sort();
    failed.sort();
    ReconcileOutcome::ScaledDown { destroyed, failed }
}

async fn destroy_and_drain<P>(provisioner: &P, instance: &InstanceId) -> ProvisionerResult<()>
where
    P: GroupProvisioner + ?Sized,
{
    let mut events = provisioner.destroy_instance(instance).await?;
    let mut reported = None;
    while let Some(event) = events.recv().await {
        debug!(
            instance = %instance,
            task = %event.name(),
            message = %event.message(),
            "destroy progress"
        );
        if reported.is_none() {
            reported = event.error().map(ToOwned::to_owned);
        }
    }
    reported.map_or(Ok(()), |reason| {
        Err(ProvisionerError::Reported {
            operation: "destroy",
            instance: instance.clone(),
            reason,
        })
    })
}

struct ActiveReconciler {
    group: GroupId,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Keeps one group at a desired size until stopped.
///
/// The scaler is either idle or maintaining exactly one group. The mutex
/// guards only that transition; ticks run on a background tokio task and
/// never overlap. Dropping the scaler ends the loop after its current tick.
pub struct GroupScaler {
    config: ScalerConfig,
    active: Mutex<Option<ActiveReconciler>>,
}

impl std::fmt::Debug for GroupScaler {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("GroupScaler")
            .field("config", &self.config)
            .field("active", &self.is_active())
            .finish()
    }
}

fn state_error(err: impl std::fmt::Display) -> ScalerError {
    ScalerError::StateUnavailable(err.to_string())
}

impl GroupScaler {
    /// Creates an idle scaler.
    #[must_use]
    pub const fn new(config: ScalerConfig) -> Self {
        Self {
            config,
            active: Mutex::new(None),
        }
    }

    /// Starts keeping `group` at `desired` members.
    ///
    /// The first tick runs one poll interval after the call. Must be called
    /// from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ScalerError::AlreadyMonitoring`] when a loop is already
    /// running, or [`ScalerError::StateUnavailable`] when the state lock is
    /// poisoned.
    pub fn maintain_count<P>(
        &self,
        provisioner: Arc<P>,
        group: GroupId,
        desired: u32,
    ) -> ScalerResult<()>
    where
        P: GroupProvisioner + ?Sized + 'static,
    {
        let mut active = self.active.lock().map_err(state_error)?;
        if let Some(current) = active.as_ref() {
            return Err(ScalerError::AlreadyMonitoring(current.group.clone()));
        }

        let (shutdown, shutdown_signal) = oneshot::channel();
        let span = info_span!("group_scaler", group = %group, desired);
        let handle = tokio::spawn(
            run_loop(
                provisioner,
                group.clone(),
                desired,
                self.config.poll_interval(),
                shutdown_signal,
            )
            .instrument(span),
        );
        *active = Some(ActiveReconciler {
            group,
            shutdown,
            handle,
        });
        Ok(())
    }

    /// Stops the running loop and waits for its current tick to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ScalerError::NotMonitoring`] when no loop is running,
    /// [`ScalerError::LoopFailed`] when the loop panicked, or
    /// [`ScalerError::StateUnavailable`] when the state lock is poisoned.
    pub async fn stop(&self) -> ScalerResult<()> {
        let current = self
            .active
            .lock()
            .map_err(state_error)?
            .take()
            .ok_or(ScalerError::NotMonitoring)?;

        if current.shutdown.send(()).is_err() {
            debug!(group = %current.group, "reconcile loop already exited");
        }
        current
            .handle
            .await
            .map_err(|err| ScalerError::LoopFailed {
                group: current.group,
                reason: err.to_string(),
            })
    }

    /// Returns whether a loop is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
            .lock()
            .is_ok_and(|active| active.is_some())
    }
}

async fn run_loop<P>(
    provisioner: Arc<P>,
    group: GroupId,
    desired: u32,
    period: Duration,
    mut shutdown: oneshot::Receiver<()>,
) where
    P: GroupProvisioner + ?Sized + 'static,
{
    info!("reconcile loop started");
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let outcome = reconcile_once(&provisioner, &group, desired).await;
                debug!(?outcome, "reconcile tick finished");
            }
        }
    }
    info!("reconcile loop stopped");
}
