//! [`GeofenceStore`] adapters.
//!
//! [`JsonFileStore`] keeps the collection as a single JSON document in the
//! data directory. [`MemoryStore`] keeps it in memory for embedding and tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::collection::GeofenceCollection;
use crate::error::{FencepostError, Result};
use crate::ports::GeofenceStore;

/// File name of the persisted collection inside the data directory.
pub const COLLECTION_FILE: &str = "geofences.json";

/// Get the default data directory.
///
/// On Linux devices: `/var/lib/fencepost/`
/// Elsewhere: the platform data directory, e.g. `~/Library/Application Support/fencepost/`
///
/// # Errors
///
/// Returns an error if no home directory can be determined.
pub fn default_data_dir() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        Ok(PathBuf::from("/var/lib/fencepost"))
    }
    #[cfg(not(target_os = "linux"))]
    {
        let dirs = directories::ProjectDirs::from("", "", "fencepost").ok_or_else(|| {
            FencepostError::PersistenceError("Cannot determine data directory".into())
        })?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

/// Geofence collection persisted as pretty-printed JSON.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `data_dir`.
    ///
    /// # Arguments
    ///
    /// * `data_dir` - Directory to store data files
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Create a store in the platform default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the default location cannot be determined.
    pub fn at_default_location() -> Result<Self> {
        Ok(Self::new(default_data_dir()?))
    }

    /// Directory holding the data files.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Full path of the collection file.
    #[must_use]
    pub fn collection_path(&self) -> PathBuf {
        self.data_dir.join(COLLECTION_FILE)
    }
}

impl GeofenceStore for JsonFileStore {
    fn collection(&self) -> Result<Option<GeofenceCollection>> {
        let path = self.collection_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        let collection: GeofenceCollection = serde_json::from_str(&content)?;
        Ok(Some(collection))
    }

    fn save_collection(&self, collection: &GeofenceCollection) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        let content = serde_json::to_string_pretty(collection)?;

        // The collection file is never left half-written.
        let path = self.collection_path();
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &path)?;

        debug!(path = %path.display(), geofences = collection.len(), "Saved geofence collection");
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        let path = self.collection_path();
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "Removed geofence collection");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Geofence collection held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collection: Mutex<Option<GeofenceCollection>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `collection`.
    #[must_use]
    pub fn with_collection(collection: GeofenceCollection) -> Self {
        Self {
            collection: Mutex::new(Some(collection)),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<GeofenceCollection>>> {
        self.collection
            .lock()
            .map_err(|_| FencepostError::StoreUnavailable("memory store lock poisoned".into()))
    }
}

impl GeofenceStore for MemoryStore {
    fn collection(&self) -> Result<Option<GeofenceCollection>> {
        Ok(self.lock()?.clone())
    }

    fn save_collection(&self, collection: &GeofenceCollection) -> Result<()> {
        *self.lock()? = Some(collection.clone());
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        *self.lock()? = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GeofenceDefinition, MonitoredRegion, TriggerType};
    use tempfile::TempDir;

    fn sample() -> GeofenceCollection {
        [
            GeofenceDefinition::new(
                1,
                vec![MonitoredRegion::new(0, 1.0, 2.0, 30.0)],
                TriggerType::Exit,
            )
            .with_tag("beach"),
            GeofenceDefinition::new(
                2,
                vec![MonitoredRegion::new(0, 3.0, 4.0, 60.0)],
                TriggerType::Both,
            ),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_missing_file_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.collection().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested"));

        store.save_collection(&sample()).unwrap();

        assert_eq!(store.collection().unwrap(), Some(sample()));
        assert!(!store.collection_path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_reset_removes_file_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        store.save_collection(&sample()).unwrap();

        store.reset().unwrap();
        store.reset().unwrap();

        assert!(store.collection().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file_is_serialization_error() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        std::fs::write(store.collection_path(), "{not json").unwrap();

        let err = store.collection().unwrap_err();
        assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
    }

    #[test]
    fn test_empty_file_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        std::fs::write(store.collection_path(), "").unwrap();
        assert!(store.collection().unwrap().is_none());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::with_collection(sample());
        assert_eq!(store.collection().unwrap().unwrap().len(), 2);

        store.save_collection(&GeofenceCollection::new()).unwrap();
        assert_eq!(store.collection().unwrap(), Some(GeofenceCollection::new()));

        store.reset().unwrap();
        assert!(store.collection().unwrap().is_none());
    }

    #[test]
    fn test_default_data_dir_is_valid_path() {
        let dir = default_data_dir().unwrap();
        assert!(!dir.as_os_str().is_empty());
    }
}
