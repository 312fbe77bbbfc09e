//! Desired machine configuration as authored by a template or caller.

use super::{MachineName, ProvisionerName};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Desired configuration for one machine.
///
/// Requests are treated as immutable values: every change of intent is a new
/// request appended to the machine record's change log. Provider-specific
/// settings (region, image, and later the instance identifier) live in the
/// open property map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineRequest {
    name: MachineName,
    provisioner: ProvisionerName,
    #[serde(default)]
    version: String,
    #[serde(default)]
    provision_workflow: Vec<String>,
    #[serde(default)]
    teardown_workflow: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    properties: BTreeMap<String, Value>,
}

impl MachineRequest {
    /// Creates a request with empty workflows and no properties.
    #[must_use]
    pub const fn new(name: MachineName, provisioner: ProvisionerName) -> Self {
        Self {
            name,
            provisioner,
            version: String::new(),
            provision_workflow: Vec::new(),
            teardown_workflow: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Sets the request schema version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the ordered task names run on create.
    #[must_use]
    pub fn with_provision_workflow<I, S>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provision_workflow = tasks.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the ordered task names run on destroy.
    #[must_use]
    pub fn with_teardown_workflow<I, S>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.teardown_workflow = tasks.into_iter().map(Into::into).collect();
        self
    }

    /// Sets a provider-specific property, replacing any previous value.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns the machine name.
    #[must_use]
    pub const fn name(&self) -> &MachineName {
        &self.name
    }

    /// Returns the provisioner that handles this request.
    #[must_use]
    pub const fn provisioner(&self) -> &ProvisionerName {
        &self.provisioner
    }

    /// Returns the request schema version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the ordered task names run on create.
    #[must_use]
    pub fn provision_workflow(&self) -> &[String] {
        &self.provision_workflow
    }

    /// Returns the ordered task names run on destroy.
    #[must_use]
    pub fn teardown_workflow(&self) -> &[String] {
        &self.teardown_workflow
    }

    /// Returns a provider-specific property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Returns a provider-specific property when it is a string.
    #[must_use]
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.property(key).and_then(Value::as_str)
    }
}
