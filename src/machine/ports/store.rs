//! Hierarchical key/value storage port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type for key/value store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Hierarchical storage key such as `machines/web-01/record`.
///
/// Segments are non-empty and never contain `/`, so a key maps one-to-one
/// onto its rendered path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StoreKey(Vec<String>);

impl StoreKey {
    /// Returns the empty root key, which prefixes every other key.
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Builds a key from its segments.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] when a segment is empty, is `.` or
    /// `..`, or contains `/`.
    pub fn new<I, S>(segments: I) -> StoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        segments
            .into_iter()
            .try_fold(Self::root(), |key, segment| key.join(segment))
    }

    /// Parses a `/`-separated key. Leading and trailing separators are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] for empty interior segments.
    pub fn parse(path: &str) -> StoreResult<Self> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        Self::new(trimmed.split('/'))
    }

    /// Returns a child key with one more segment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] when the segment is invalid.
    pub fn join(mut self, segment: impl Into<String>) -> StoreResult<Self> {
        let value = segment.into();
        if value.is_empty() || value == "." || value == ".." || value.contains('/') {
            return Err(StoreError::InvalidKey(value));
        }
        self.0.push(value);
        Ok(self)
    }

    /// Returns the key segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Returns the final segment, if any.
    #[must_use]
    pub fn leaf(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Returns whether `prefix` is an ancestor of (or equal to) this key.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Returns whether this is the root key.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0.join("/"))
    }
}

/// Opaque hierarchical key/value store.
///
/// Values are leaves: a key that holds a value is never also a prefix of
/// other keys.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Stores a value, replacing any existing one.
    async fn save(&self, key: &StoreKey, value: Vec<u8>) -> StoreResult<()>;

    /// Reads a value.
    async fn get(&self, key: &StoreKey) -> StoreResult<Option<Vec<u8>>>;

    /// Lists every stored key below `prefix`, in key order.
    async fn list_recursive(&self, prefix: &StoreKey) -> StoreResult<Vec<StoreKey>>;

    /// Removes a value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no value exists under `key`.
    async fn delete(&self, key: &StoreKey) -> StoreResult<()>;
}

/// Errors returned by key/value store implementations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The key segment is not usable as part of a hierarchical key.
    #[error("invalid store key segment: '{0}'")]
    InvalidKey(String),

    /// No value exists under the key.
    #[error("no value stored under key: {0}")]
    NotFound(StoreKey),

    /// A value could not be encoded for storage.
    #[error("serialization error: {0}")]
    Serialization(Arc<dyn std::error::Error + Send + Sync>),

    /// Stored data could not be decoded into domain types.
    #[error("invalid persisted data under {key}: {reason}")]
    InvalidPersistedData {
        /// Key holding the invalid value.
        key: StoreKey,
        /// Decoding failure.
        reason: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wraps an encoding failure.
    pub fn serialization(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Serialization(Arc::new(err))
    }

    /// Wraps a decoding failure for the value stored under `key`.
    pub fn invalid_persisted_data(
        key: StoreKey,
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::InvalidPersistedData {
            key,
            reason: Arc::new(err),
        }
    }

    /// Wraps a persistence-layer failure.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
