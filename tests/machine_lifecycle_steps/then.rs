//! Then steps for machine lifecycle BDD scenarios.

use super::world::{MachineLifecycleWorld, run_async};
use drydock::machine::{
    domain::{MachineName, MachineRecord, MachineStatus},
    services::MachineLifecycleError,
};
use rstest_bdd_macros::then;

fn stored_record(world: &MachineLifecycleWorld, name: &str) -> Result<MachineRecord, eyre::Report> {
    let machine = MachineName::new(name)?;
    run_async(world.service.find(&machine))?
        .ok_or_else(|| eyre::eyre!("no record stored for {machine}"))
}

#[then("the pipeline emits {count:usize} events")]
fn pipeline_emits_events(world: &MachineLifecycleWorld, count: usize) -> Result<(), eyre::Report> {
    if let Some(err) = world.last_error.as_ref() {
        return Err(eyre::eyre!("expected a running pipeline, got {err}"));
    }
    if world.events.len() != count {
        return Err(eyre::eyre!(
            "expected {count} events, found {}",
            world.events.len()
        ));
    }
    Ok(())
}

#[then(r#"the machine "{name}" has status "{status}""#)]
fn machine_has_status(
    world: &MachineLifecycleWorld,
    name: String,
    status: String,
) -> Result<(), eyre::Report> {
    let expected = MachineStatus::try_from(status.as_str())
        .map_err(|err| eyre::eyre!("invalid expected status in scenario: {err}"))?;
    let record = stored_record(world, &name)?;
    if record.status() != expected {
        return Err(eyre::eyre!(
            "expected status {expected}, found {}",
            record.status()
        ));
    }
    Ok(())
}

#[then(r#"the machine "{name}" has instance id "{instance_id}""#)]
fn machine_has_instance_id(
    world: &MachineLifecycleWorld,
    name: String,
    instance_id: String,
) -> Result<(), eyre::Report> {
    let record = stored_record(world, &name)?;
    let recorded = record.summary().instance_id().map(|id| id.as_str());
    if recorded != Some(instance_id.as_str()) {
        return Err(eyre::eyre!(
            "expected instance id {instance_id}, found {recorded:?}"
        ));
    }
    Ok(())
}

#[then(r#"the machine "{name}" records {count:usize} changes"#)]
fn machine_records_changes(
    world: &MachineLifecycleWorld,
    name: String,
    count: usize,
) -> Result<(), eyre::Report> {
    let record = stored_record(world, &name)?;
    if record.changes().len() != count {
        return Err(eyre::eyre!(
            "expected {count} changes, found {}",
            record.changes().len()
        ));
    }
    Ok(())
}

#[then(r#"creation fails naming unsupported task "{task}""#)]
fn creation_fails_naming_task(
    world: &MachineLifecycleWorld,
    task: String,
) -> Result<(), eyre::Report> {
    match world.last_error.as_ref() {
        Some(MachineLifecycleError::UnknownTask { task: reported, .. }) if *reported == task => {
            Ok(())
        }
        other => Err(eyre::eyre!(
            "expected UnknownTask error for {task}, got {other:?}"
        )),
    }
}

#[then(r#"no record exists for "{name}""#)]
fn no_record_exists(world: &MachineLifecycleWorld, name: String) -> Result<(), eyre::Report> {
    let machine = MachineName::new(name)?;
    if run_async(world.service.find(&machine))?.is_some() {
        return Err(eyre::eyre!("record for {machine} should not exist"));
    }
    Ok(())
}

#[then(r#"the last event reports error "{message}""#)]
fn last_event_reports_error(
    world: &MachineLifecycleWorld,
    message: String,
) -> Result<(), eyre::Report> {
    let last = world
        .events
        .last()
        .ok_or_else(|| eyre::eyre!("pipeline emitted no events"))?;
    if last.error() != Some(message.as_str()) {
        return Err(eyre::eyre!(
            "expected error {message}, found {:?}",
            last.error()
        ));
    }
    Ok(())
}
