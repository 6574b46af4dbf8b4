//! Durable storage for trained latent-factor models.
//!
//! Artifacts are write-once; saving never overwrites an older artifact, it
//! adds a newer one that `latest` then returns.

use sources::{LatentFactorModel, ModelError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Corrupt artifact {handle}: {source}")]
    Corrupt {
        handle: String,
        #[source]
        source: ModelError,
    },

    #[error("Cannot serialize model: {0}")]
    Serialize(#[source] ModelError),
}

/// Names one stored artifact; handles sort oldest to newest
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactHandle(String);

impl ArtifactHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait ArtifactStore: Send + Sync {
    fn save(&self, model: &LatentFactorModel) -> Result<ArtifactHandle, StoreError>;

    /// `Ok(None)` when no artifact exists under `handle`
    fn load(&self, handle: &ArtifactHandle) -> Result<Option<LatentFactorModel>, StoreError>;

    /// Most recently saved artifact, if any
    fn latest(&self) -> Result<Option<ArtifactHandle>, StoreError>;
}

const PREFIX: &str = "latent-";
const EXTENSION: &str = ".json";

/// One JSON file per model in a directory
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    dir: PathBuf,
}

impl FileArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, handle: &ArtifactHandle) -> PathBuf {
        self.dir.join(handle.as_str())
    }

    /// Next free name; millisecond timestamp plus a sequence for same-ms saves
    fn next_handle(&self) -> ArtifactHandle {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let mut seq = 0u32;
        loop {
            let handle = ArtifactHandle(format!("{}{:015}-{:04}{}", PREFIX, millis, seq, EXTENSION));
            if !self.path_of(&handle).exists() {
                return handle;
            }
            seq += 1;
        }
    }
}

impl ArtifactStore for FileArtifactStore {
    fn save(&self, model: &LatentFactorModel) -> Result<ArtifactHandle, StoreError> {
        fs::create_dir_all(&self.dir)?;
        let bytes = model.to_json().map_err(StoreError::Serialize)?;

        let handle = self.next_handle();
        let tmp = self.dir.join(format!(".{}.tmp", handle));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, self.path_of(&handle))?;

        info!("Saved model artifact {} in {:?}", handle, self.dir);
        Ok(handle)
    }

    fn load(&self, handle: &ArtifactHandle) -> Result<Option<LatentFactorModel>, StoreError> {
        let bytes = match fs::read(self.path_of(handle)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let model = LatentFactorModel::from_json(&bytes).map_err(|source| StoreError::Corrupt {
            handle: handle.to_string(),
            source,
        })?;
        debug!("Loaded model artifact {}", handle);
        Ok(Some(model))
    }

    fn latest(&self) -> Result<Option<ArtifactHandle>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut latest: Option<ArtifactHandle> = None;
        for entry in entries {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if !(name.starts_with(PREFIX) && name.ends_with(EXTENSION)) {
                continue;
            }
            let handle = ArtifactHandle(name);
            if latest.as_ref().is_none_or(|current| handle > *current) {
                latest = Some(handle);
            }
        }
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{Interaction, InteractionMatrix};
    use sources::LatentFactorConfig;

    fn create_test_model() -> LatentFactorModel {
        let matrix = InteractionMatrix::from_interactions(&[
            Interaction::new("u1", "a", 1.0),
            Interaction::new("u1", "b", 2.0),
            Interaction::new("u2", "a", 3.0),
        ]);
        let config = LatentFactorConfig {
            factor_count: 4,
            epoch_count: 3,
            holdout_fraction: 0.0,
            ..LatentFactorConfig::default()
        };
        LatentFactorModel::train(&matrix, &config).unwrap()
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path().join("models"));
        let model = create_test_model();

        let handle = store.save(&model).unwrap();
        let loaded = store.load(&handle).unwrap().unwrap();

        assert_eq!(loaded.predict("u1", "b"), model.predict("u1", "b"));
        assert_eq!(loaded.fingerprint(), model.fingerprint());
    }

    #[test]
    fn test_latest_is_newest_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path());
        let model = create_test_model();

        let first = store.save(&model).unwrap();
        let second = store.save(&model).unwrap();

        assert!(second > first);
        assert_eq!(store.latest().unwrap(), Some(second));
    }

    #[test]
    fn test_missing_dir_has_no_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path().join("absent"));
        assert_eq!(store.latest().unwrap(), None);
        assert!(store.load(&ArtifactHandle::new("latent-1.json")).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path());
        fs::write(dir.path().join("latent-000000000000001-0000.json"), b"{ nope").unwrap();

        let handle = store.latest().unwrap().unwrap();
        assert!(matches!(store.load(&handle), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_unrelated_files_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), b"hi").unwrap();
        let store = FileArtifactStore::new(dir.path());
        assert_eq!(store.latest().unwrap(), None);
    }
}
