//! In-memory integration tests for machine create, destroy and cleanup.

use super::helpers::{EXPLODE_ERROR, TestService, drain, machine_name, request, service};
use drydock::machine::{domain::MachineStatus, services::MachineLifecycleError};
use eyre::{OptionExt, WrapErr};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn create_streams_events_in_task_order(service: TestService) -> eyre::Result<()> {
    let stream = service
        .create(request("web-01", &["launch", "configure"], &["terminate"]))
        .await
        .wrap_err("create machine")?;
    let events = drain(stream).await;

    let observed: Vec<(&str, &str)> = events
        .iter()
        .map(|event| (event.name(), event.message()))
        .collect();
    eyre::ensure!(
        observed
            == vec![
                ("launch", "requesting instance"),
                ("launch", "machine state updated"),
                ("launch", "completed"),
                ("configure", "applying configuration"),
                ("configure", "completed"),
            ],
        "unexpected event sequence: {observed:?}"
    );

    let record = service
        .find(&machine_name("web-01"))
        .await?
        .ok_or_eyre("record should exist")?;
    eyre::ensure!(record.status() == MachineStatus::Provisioned, "machine should be provisioned");
    eyre::ensure!(record.summary().ip_address() == Some("10.0.0.5"), "ip address should be recorded");
    let state = service
        .machine_state(&machine_name("web-01"))
        .await?
        .ok_or_eyre("machine state should be persisted")?;
    eyre::ensure!(state.property_str("instance_id") == Some("i-0abc"), "instance id should be persisted");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failing_task_leaves_a_failed_record(service: TestService) -> eyre::Result<()> {
    let stream = service
        .create(request(
            "web-02",
            &["launch", "explode", "configure"],
            &["terminate"],
        ))
        .await
        .wrap_err("create machine")?;
    let events = drain(stream).await;

    let last = events.last().ok_or_eyre("expected events")?;
    eyre::ensure!(last.name() == "explode", "last event should come from explode");
    eyre::ensure!(last.error() == Some(EXPLODE_ERROR), "last event should carry the task error");
    eyre::ensure!(events.iter().all(|event| event.name() != "configure"), "configure must not run after a failure");

    let record = service
        .find(&machine_name("web-02"))
        .await?
        .ok_or_eyre("record should exist")?;
    eyre::ensure!(record.status() == MachineStatus::Failed, "machine should be failed");
    eyre::ensure!(record.summary().instance_id().is_none(), "failed machine has no instance id");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_machine_can_be_torn_down(service: TestService) -> eyre::Result<()> {
    drain(
        service
            .create(request("web-03", &["explode"], &["drain", "terminate"]))
            .await?,
    )
    .await;

    let events = drain(service.destroy(&machine_name("web-03")).await?).await;

    let names: Vec<&str> = events.iter().map(|event| event.name()).collect();
    eyre::ensure!(names == vec!["drain", "terminate"], "got {names:?}");
    let record = service
        .find(&machine_name("web-03"))
        .await?
        .ok_or_eyre("record should be kept")?;
    eyre::ensure!(record.status() == MachineStatus::Terminated, "machine should be terminated");
    eyre::ensure!(record.changes().len() == 2, "destroy should append a change");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_teardown_task_is_rejected_before_work(service: TestService) -> eyre::Result<()> {
    drain(
        service
            .create(request("web-04", &["launch"], &["snapshot"]))
            .await?,
    )
    .await;

    let result = service.destroy(&machine_name("web-04")).await;

    let Err(MachineLifecycleError::UnknownTask { task, valid }) = result else {
        return Err(eyre::eyre!("expected unknown task error, got {result:?}"));
    };
    eyre::ensure!(task == "snapshot", "wrong unknown task reported");
    eyre::ensure!(valid == vec!["drain".to_owned(), "terminate".to_owned()], "valid set should list teardown tasks");
    let record = service
        .find(&machine_name("web-04"))
        .await?
        .ok_or_eyre("record should exist")?;
    eyre::ensure!(record.status() == MachineStatus::Provisioned, "rejected destroy must not change status");
    eyre::ensure!(record.changes().len() == 1, "rejected destroy must not append a change");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn list_and_delete_manage_settled_records(service: TestService) -> eyre::Result<()> {
    for name in ["db-02", "db-01"] {
        drain(service.create(request(name, &["launch"], &["terminate"])).await?).await;
    }

    let names: Vec<String> = service
        .list()
        .await?
        .iter()
        .map(|record| record.machine_name().to_string())
        .collect();
    eyre::ensure!(names == vec!["db-01", "db-02"], "got {names:?}");

    service
        .delete(&machine_name("db-01"))
        .await
        .wrap_err("delete settled machine")?;
    eyre::ensure!(service.find(&machine_name("db-01")).await?.is_none(), "deleted record should be gone");
    eyre::ensure!(
        matches!(
            service.delete(&machine_name("db-01")).await,
            Err(MachineLifecycleError::NotFound(_))
        ),
        "second delete should report the machine missing"
    );
    Ok(())
}
