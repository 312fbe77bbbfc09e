//! Machine record aggregate: summary, event log and change log.

use super::{
    InstanceId, MachineEvent, MachineName, MachineRequest, ParseMachineStatusError,
    ProvisionerName,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineStatus {
    /// A create was requested; no task has run yet.
    Initiated,
    /// A task is about to run or running.
    Pending,
    /// Every provision task succeeded.
    Provisioned,
    /// A task failed and the pipeline stopped.
    Failed,
    /// Every teardown task succeeded.
    Terminated,
}

impl MachineStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Pending => "pending",
            Self::Provisioned => "provisioned",
            Self::Failed => "failed",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for MachineStatus {
    type Error = ParseMachineStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "initiated" => Ok(Self::Initiated),
            "pending" => Ok(Self::Pending),
            "provisioned" => Ok(Self::Provisioned),
            "failed" => Ok(Self::Failed),
            "terminated" => Ok(Self::Terminated),
            _ => Err(ParseMachineStatusError(value.to_owned())),
        }
    }
}

/// Summary fields of a machine record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSummary {
    status: MachineStatus,
    machine_name: MachineName,
    #[serde(default)]
    instance_id: Option<InstanceId>,
    #[serde(default)]
    ip_address: Option<String>,
    provisioner: ProvisionerName,
    #[serde(with = "chrono::serde::ts_seconds")]
    created: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    last_modified: DateTime<Utc>,
}

impl MachineSummary {
    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> MachineStatus {
        self.status
    }

    /// Returns the machine name.
    #[must_use]
    pub const fn machine_name(&self) -> &MachineName {
        &self.machine_name
    }

    /// Returns the provider-assigned instance identifier, once known.
    #[must_use]
    pub const fn instance_id(&self) -> Option<&InstanceId> {
        self.instance_id.as_ref()
    }

    /// Returns the machine IP address, once known.
    #[must_use]
    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    /// Returns the provisioner that owns the machine.
    #[must_use]
    pub const fn provisioner(&self) -> &ProvisionerName {
        &self.provisioner
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Returns the latest modification timestamp.
    #[must_use]
    pub const fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }
}

/// Persistent lifecycle state of one machine.
///
/// `events` and `changes` are append-only: nothing in this type removes or
/// rewrites an entry once pushed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineRecord {
    summary: MachineSummary,
    #[serde(default)]
    events: Vec<MachineEvent>,
    #[serde(default)]
    changes: Vec<MachineRequest>,
}

impl MachineRecord {
    /// Creates a blank record in the `initiated` status.
    #[must_use]
    pub fn new(machine_name: MachineName, provisioner: ProvisionerName, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            summary: MachineSummary {
                status: MachineStatus::Initiated,
                machine_name,
                instance_id: None,
                ip_address: None,
                provisioner,
                created: timestamp,
                last_modified: timestamp,
            },
            events: Vec::new(),
            changes: Vec::new(),
        }
    }

    /// Returns the summary fields.
    #[must_use]
    pub const fn summary(&self) -> &MachineSummary {
        &self.summary
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> MachineStatus {
        self.summary.status
    }

    /// Returns the machine name.
    #[must_use]
    pub const fn machine_name(&self) -> &MachineName {
        &self.summary.machine_name
    }

    /// Returns the event log in append order.
    #[must_use]
    pub fn events(&self) -> &[MachineEvent] {
        &self.events
    }

    /// Returns the change log in append order.
    #[must_use]
    pub fn changes(&self) -> &[MachineRequest] {
        &self.changes
    }

    /// Returns the most recently appended change, the machine's current
    /// intent.
    #[must_use]
    pub fn last_change(&self) -> Option<&MachineRequest> {
        self.changes.last()
    }

    /// Appends an event and bumps the modification timestamp.
    pub fn append_event(&mut self, event: MachineEvent, clock: &impl Clock) {
        self.events.push(event);
        self.touch(clock);
    }

    /// Appends a request snapshot to the change log.
    pub fn append_change(&mut self, request: MachineRequest, clock: &impl Clock) {
        self.changes.push(request);
        self.touch(clock);
    }

    /// Marks a task as about to run.
    pub fn mark_pending(&mut self, clock: &impl Clock) {
        self.set_status(MachineStatus::Pending, clock);
    }

    /// Marks the pipeline as failed.
    pub fn mark_failed(&mut self, clock: &impl Clock) {
        self.set_status(MachineStatus::Failed, clock);
    }

    /// Marks the machine as provisioned and records the transition event.
    pub fn mark_provisioned(&mut self, clock: &impl Clock) {
        self.set_status(MachineStatus::Provisioned, clock);
        self.append_event(
            MachineEvent::new("provisioned", "machine provisioned", clock.utc()),
            clock,
        );
    }

    /// Marks the machine as terminated and records the transition event.
    pub fn mark_terminated(&mut self, clock: &impl Clock) {
        self.set_status(MachineStatus::Terminated, clock);
        self.append_event(
            MachineEvent::new("terminated", "machine terminated", clock.utc()),
            clock,
        );
    }

    /// Stores the provider-assigned instance identifier.
    pub fn set_instance_id(&mut self, instance_id: InstanceId, clock: &impl Clock) {
        self.summary.instance_id = Some(instance_id);
        self.touch(clock);
    }

    /// Stores the machine IP address.
    pub fn set_ip_address(&mut self, ip_address: impl Into<String>, clock: &impl Clock) {
        self.summary.ip_address = Some(ip_address.into());
        self.touch(clock);
    }

    fn set_status(&mut self, status: MachineStatus, clock: &impl Clock) {
        self.summary.status = status;
        self.touch(clock);
    }

    fn touch(&mut self, clock: &impl Clock) {
        self.summary.last_modified = clock.utc();
    }
}
