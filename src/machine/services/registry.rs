//! Explicit registry of provisioner plugins.

use crate::machine::{domain::ProvisionerName, ports::Provisioner};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while building a registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A provisioner with the same name is already registered.
    #[error("provisioner {0} is already registered")]
    DuplicateProvisioner(ProvisionerName),
}

/// Provisioners available to the lifecycle service, keyed by name.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Default)]
pub struct ProvisionerRegistry {
    provisioners: HashMap<ProvisionerName, Arc<dyn Provisioner>>,
}

impl fmt::Debug for ProvisionerRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ProvisionerRegistry")
            .field("provisioners", &self.names())
            .finish()
    }
}

impl ProvisionerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a provisioner under its own name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateProvisioner`] when the name is taken.
    pub fn register(&mut self, provisioner: Arc<dyn Provisioner>) -> Result<(), RegistryError> {
        let name = provisioner.name().clone();
        if self.provisioners.contains_key(&name) {
            return Err(RegistryError::DuplicateProvisioner(name));
        }
        self.provisioners.insert(name, provisioner);
        Ok(())
    }

    /// Looks up a provisioner by name.
    #[must_use]
    pub fn get(&self, name: &ProvisionerName) -> Option<Arc<dyn Provisioner>> {
        self.provisioners.get(name).cloned()
    }

    /// Returns the registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<ProvisionerName> {
        let mut names: Vec<ProvisionerName> = self.provisioners.keys().cloned().collect();
        names.sort();
        names
    }
}
