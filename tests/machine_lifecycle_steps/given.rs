//! Given steps for machine lifecycle BDD scenarios.

use super::world::{MachineLifecycleWorld, PROVISIONER, run_async};
use drydock::machine::domain::{MachineName, MachineRequest, ProvisionerName};
use eyre::WrapErr;
use rstest_bdd_macros::given;

#[given(r#"a machine request "{name}" with provision workflow "{workflow}""#)]
fn machine_request(
    world: &mut MachineLifecycleWorld,
    name: String,
    workflow: String,
) -> Result<(), eyre::Report> {
    let request = MachineRequest::new(MachineName::new(name)?, ProvisionerName::new(PROVISIONER)?)
        .with_provision_workflow(workflow.split(',').map(str::trim))
        .with_teardown_workflow(["terminate"]);
    world.pending_request = Some(request);
    Ok(())
}

#[given("the machine has been provisioned")]
fn machine_has_been_provisioned(world: &mut MachineLifecycleWorld) -> Result<(), eyre::Report> {
    let request = world
        .pending_request
        .clone()
        .ok_or_else(|| eyre::eyre!("missing pending request in scenario world"))?;
    let outcome = run_async(world.service.create(request));
    let stream = outcome.wrap_err("create machine in scenario setup")?;
    world.record_outcome(Ok(stream));
    Ok(())
}
