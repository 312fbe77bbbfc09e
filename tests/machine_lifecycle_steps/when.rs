//! When steps for machine lifecycle BDD scenarios.

use super::world::{MachineLifecycleWorld, run_async};
use drydock::machine::domain::MachineName;
use rstest_bdd_macros::when;

#[when("the machine is created")]
fn machine_is_created(world: &mut MachineLifecycleWorld) -> Result<(), eyre::Report> {
    let request = world
        .pending_request
        .clone()
        .ok_or_else(|| eyre::eyre!("missing pending request in scenario world"))?;
    let outcome = run_async(world.service.create(request));
    world.record_outcome(outcome);
    Ok(())
}

#[when(r#"machine "{name}" is destroyed"#)]
fn machine_is_destroyed(world: &mut MachineLifecycleWorld, name: String) -> Result<(), eyre::Report> {
    let machine = MachineName::new(name)?;
    let outcome = run_async(world.service.destroy(&machine));
    world.record_outcome(outcome);
    Ok(())
}
