//! Directory-backed key/value store.
//!
//! Each key maps onto a file below the store root (`machines/web-01/record`
//! becomes `<root>/machines/web-01/record`). Writes go to a sibling temporary
//! file that is renamed into place, so readers never observe a partial value.

use crate::machine::ports::{KeyValueStore, StoreError, StoreKey, StoreResult};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use std::io;
use std::sync::Arc;
use uuid::Uuid;

/// Prefix of in-progress writes.
const PARTIAL_PREFIX: &str = ".";
/// Suffix of in-progress writes; such files are never listed.
const PARTIAL_SUFFIX: &str = ".partial";

/// Key/value store rooted at a capability-scoped directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: Arc<Dir>,
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] when the directory cannot be
    /// created or opened.
    pub fn open(path: &Utf8Path) -> StoreResult<Self> {
        Dir::create_ambient_dir_all(path, ambient_authority()).map_err(StoreError::persistence)?;
        let root = Dir::open_ambient_dir(path, ambient_authority())
            .map_err(StoreError::persistence)?;
        Ok(Self::from_dir(root))
    }

    /// Wraps an already opened directory.
    #[must_use]
    pub fn from_dir(root: Dir) -> Self {
        Self {
            root: Arc::new(root),
        }
    }

    async fn blocking<T, F>(&self, operation: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Dir) -> StoreResult<T> + Send + 'static,
    {
        let root = Arc::clone(&self.root);
        tokio::task::spawn_blocking(move || operation(&root))
            .await
            .map_err(StoreError::persistence)?
    }
}

fn relative_path(key: &StoreKey) -> Utf8PathBuf {
    key.segments().iter().collect()
}

fn write_atomically(root: &Dir, key: &StoreKey, value: &[u8]) -> io::Result<()> {
    let path = relative_path(key);
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new(""));
    if !parent.as_str().is_empty() {
        root.create_dir_all(parent)?;
    }
    let partial = parent.join(format!(
        "{PARTIAL_PREFIX}{}{PARTIAL_SUFFIX}",
        Uuid::new_v4().simple()
    ));
    root.write(&partial, value)?;
    root.rename(&partial, root, &path).inspect_err(|_| {
        if root.remove_file(&partial).is_err() {
            tracing::debug!(path = %partial, "failed to clean up partial write");
        }
    })
}

fn read_value(root: &Dir, key: &StoreKey) -> io::Result<Option<Vec<u8>>> {
    match root.read(relative_path(key)) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

fn is_partial_write(file_name: &str) -> bool {
    file_name.starts_with(PARTIAL_PREFIX) && file_name.ends_with(PARTIAL_SUFFIX)
}

fn collect_keys(root: &Dir, prefix: &StoreKey) -> StoreResult<Vec<StoreKey>> {
    let start = relative_path(prefix);
    if !prefix.is_root() {
        match root.metadata(&start) {
            Ok(metadata) if metadata.is_file() => return Ok(vec![prefix.clone()]),
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::persistence(err)),
        }
    }

    let mut keys = Vec::new();
    let mut pending = vec![prefix.clone()];
    while let Some(directory) = pending.pop() {
        let listing = if directory.is_root() {
            root.entries()
        } else {
            root.read_dir(relative_path(&directory))
        };
        let entries = listing.map_err(StoreError::persistence)?;

        for entry in entries {
            let dir_entry = entry.map_err(StoreError::persistence)?;
            let file_name = dir_entry.file_name().map_err(StoreError::persistence)?;
            let file_type = dir_entry.file_type().map_err(StoreError::persistence)?;
            if file_type.is_dir() {
                pending.push(directory.clone().join(file_name)?);
            } else if !is_partial_write(&file_name) {
                keys.push(directory.clone().join(file_name)?);
            }
        }
    }

    keys.sort();
    Ok(keys)
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn save(&self, key: &StoreKey, value: Vec<u8>) -> StoreResult<()> {
        if key.is_root() {
            return Err(StoreError::InvalidKey(String::new()));
        }
        let owned_key = key.clone();
        self.blocking(move |root| {
            write_atomically(root, &owned_key, &value).map_err(StoreError::persistence)
        })
        .await
    }

    async fn get(&self, key: &StoreKey) -> StoreResult<Option<Vec<u8>>> {
        if key.is_root() {
            return Ok(None);
        }
        let owned_key = key.clone();
        self.blocking(move |root| read_value(root, &owned_key).map_err(StoreError::persistence))
            .await
    }

    async fn list_recursive(&self, prefix: &StoreKey) -> StoreResult<Vec<StoreKey>> {
        let owned_prefix = prefix.clone();
        self.blocking(move |root| collect_keys(root, &owned_prefix))
            .await
    }

    async fn delete(&self, key: &StoreKey) -> StoreResult<()> {
        let owned_key = key.clone();
        self.blocking(move |root| match root.remove_file(relative_path(&owned_key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(owned_key))
            }
            Err(err) => Err(StoreError::persistence(err)),
        })
        .await
    }
}
