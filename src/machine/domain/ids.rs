//! Identifier and validated-name types for machines, provisioners and groups.

use super::MachineDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length for a machine name, matching a DNS host name.
const MAX_MACHINE_NAME_LENGTH: usize = 253;

/// Globally unique, validated machine name.
///
/// Machine names double as storage key segments, so they are restricted to
/// characters that cannot introduce a path separator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MachineName(String);

impl MachineName {
    /// Creates a validated machine name.
    ///
    /// The input is trimmed. Only ASCII alphanumerics, `-`, `_` and `.` are
    /// accepted, and the name may not consist of dots alone.
    ///
    /// # Errors
    ///
    /// Returns [`MachineDomainError`] when validation fails.
    pub fn new(value: impl Into<String>) -> Result<Self, MachineDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(MachineDomainError::EmptyMachineName);
        }

        let has_valid_characters = trimmed.chars().all(|character| {
            character.is_ascii_alphanumeric() || matches!(character, '-' | '_' | '.')
        });
        if !has_valid_characters || trimmed.chars().all(|character| character == '.') {
            return Err(MachineDomainError::InvalidMachineName(trimmed.to_owned()));
        }

        if trimmed.len() > MAX_MACHINE_NAME_LENGTH {
            return Err(MachineDomainError::MachineNameTooLong(trimmed.to_owned()));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the machine name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for MachineName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for MachineName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Registered provisioner name, such as `aws` or `azure`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvisionerName(String);

impl ProvisionerName {
    /// Creates a provisioner name. The input is trimmed and lowercased.
    ///
    /// # Errors
    ///
    /// Returns [`MachineDomainError::EmptyProvisionerName`] when the name is
    /// blank.
    pub fn new(value: impl Into<String>) -> Result<Self, MachineDomainError> {
        let normalized = value.into().trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(MachineDomainError::EmptyProvisionerName);
        }
        Ok(Self(normalized))
    }

    /// Returns the provisioner name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProvisionerName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Provider-assigned instance identifier.
///
/// Ordering is lexicographic on the raw identifier, which the scaler relies
/// on for stable selection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Creates an instance identifier.
    ///
    /// # Errors
    ///
    /// Returns [`MachineDomainError::EmptyInstanceId`] when the identifier is
    /// blank.
    pub fn new(value: impl Into<String>) -> Result<Self, MachineDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(MachineDomainError::EmptyInstanceId);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Identifier of a named instance group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    /// Creates a group identifier.
    ///
    /// # Errors
    ///
    /// Returns [`MachineDomainError::EmptyGroupId`] when the identifier is
    /// blank.
    pub fn new(value: impl Into<String>) -> Result<Self, MachineDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(MachineDomainError::EmptyGroupId);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
