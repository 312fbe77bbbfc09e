//! In-memory integration tests for group reconciliation.

use std::sync::Arc;
use std::time::Duration;

use super::helpers::memory_provisioner;
use drydock::machine::{
    domain::{GroupId, InstanceId},
    ports::GroupProvisioner,
};
use drydock::scaler::{GroupScaler, ReconcileOutcome, ScalerConfig, reconcile_once};
use eyre::WrapErr;

fn group() -> eyre::Result<GroupId> {
    GroupId::new("workers").wrap_err("group id")
}

fn ids(raw: &[&str]) -> eyre::Result<Vec<InstanceId>> {
    raw.iter()
        .map(|value| InstanceId::new(*value).wrap_err("instance id"))
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn reconcile_converges_in_both_directions() -> eyre::Result<()> {
    let provisioner = Arc::new(memory_provisioner());
    provisioner.set_group_instances(group()?, ids(&["i-3", "i-1", "i-2"])?)?;

    let down = reconcile_once(&provisioner, &group()?, 1).await;
    eyre::ensure!(
        down == ReconcileOutcome::ScaledDown {
            destroyed: ids(&["i-1", "i-2"])?,
            failed: Vec::new(),
        },
        "unexpected scale-down outcome: {down:?}"
    );
    eyre::ensure!(
        provisioner.instances(&group()?).await? == ids(&["i-3"])?,
        "only the highest id should remain"
    );

    let up = reconcile_once(&provisioner, &group()?, 4).await;
    eyre::ensure!(
        up == ReconcileOutcome::ScaledUp { requested: 3 },
        "unexpected scale-up outcome: {up:?}"
    );
    eyre::ensure!(
        provisioner.instances(&group()?).await?.len() == 4,
        "group should have grown to four members"
    );

    let steady = reconcile_once(&provisioner, &group()?, 4).await;
    eyre::ensure!(steady == ReconcileOutcome::Steady, "group should be steady");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn background_loop_keeps_group_at_target() -> eyre::Result<()> {
    let provisioner = Arc::new(memory_provisioner());
    provisioner.set_group_instances(group()?, ids(&["i-1"])?)?;
    let scaler = GroupScaler::new(ScalerConfig {
        poll_interval_secs: 5,
    });

    scaler.maintain_count(Arc::clone(&provisioner), group()?, 3)?;
    tokio::time::sleep(Duration::from_secs(6)).await;
    eyre::ensure!(
        provisioner.instances(&group()?).await?.len() == 3,
        "first tick should fill the group"
    );

    provisioner.set_group_instances(group()?, ids(&["i-1", "i-2", "i-3", "i-4", "i-5"])?)?;
    tokio::time::sleep(Duration::from_secs(5)).await;
    scaler.stop().await?;

    let mut destroyed = provisioner.destroyed()?;
    destroyed.sort();
    eyre::ensure!(
        destroyed == ids(&["i-1", "i-2"])?,
        "surplus should be trimmed lowest first"
    );
    eyre::ensure!(!scaler.is_active(), "scaler should be idle after stop");
    Ok(())
}
