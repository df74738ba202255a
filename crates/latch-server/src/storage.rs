//! File-backed owner store.
//!
//! The owner pattern is written as a small CBOR record next to the device
//! identity. Writes go to a temporary file that is synced and renamed into
//! place, so a crash leaves either the old record or the new one.

use std::{
    fs::{self, File},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use latch_core::{BlessingPattern, OwnerStore, StoreError};
use serde::{Deserialize, Serialize};

/// Current on-disk record version.
const RECORD_VERSION: u8 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct OwnerRecord {
    version: u8,
    pattern: BlessingPattern,
}

/// Owner store persisting to a single file.
#[derive(Debug)]
pub struct FileOwnerStore {
    path: PathBuf,
    /// Serializes writers within this process.
    write_lock: Mutex<()>,
}

impl FileOwnerStore {
    /// Store at `path`. The file is created on first claim.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    /// Location of the record.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OwnerStore for FileOwnerStore {
    fn load(&self) -> Result<Option<BlessingPattern>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(format!("{}: {}", self.path.display(), e))),
        };

        let record: OwnerRecord = ciborium::de::from_reader(&bytes[..])
            .map_err(|e| StoreError::Corrupt(format!("{}: {}", self.path.display(), e)))?;

        if record.version != RECORD_VERSION {
            return Err(StoreError::Corrupt(format!(
                "{}: unsupported record version {}",
                self.path.display(),
                record.version
            )));
        }

        Ok(Some(record.pattern))
    }

    fn store(&self, pattern: &BlessingPattern) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;

        let record = OwnerRecord { version: RECORD_VERSION, pattern: pattern.clone() };
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&record, &mut bytes)
            .map_err(|e| StoreError::Io(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let tmp = self.path.with_extension("tmp");
        let mut file = File::create(&tmp).map_err(io_error)?;
        file.write_all(&bytes).map_err(io_error)?;
        file.sync_all().map_err(io_error)?;
        fs::rename(&tmp, &self.path).map_err(io_error)?;

        tracing::debug!("owner record written to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(e)),
        }
    }
}

fn io_error(err: std::io::Error) -> StoreError {
    StoreError::Io(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(s: &str) -> BlessingPattern {
        BlessingPattern::parse(s).unwrap()
    }

    #[test]
    fn missing_file_means_unclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileOwnerStore::new(dir.path().join("owner.cbor"));

        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn pattern_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("owner.cbor");

        FileOwnerStore::new(&path).store(&pattern("device/alice")).unwrap();

        let reopened = FileOwnerStore::new(&path);
        assert_eq!(reopened.load().unwrap(), Some(pattern("device/alice")));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn exact_patterns_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileOwnerStore::new(dir.path().join("owner.cbor"));

        store.store(&pattern("device/alice/$")).unwrap();
        assert!(store.load().unwrap().unwrap().is_exact());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("owner.cbor");
        fs::write(&path, b"not cbor at all").unwrap();

        let result = FileOwnerStore::new(&path).load();
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("owner.cbor");

        let record = OwnerRecord { version: 9, pattern: pattern("device/alice") };
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&record, &mut bytes).unwrap();
        fs::write(&path, bytes).unwrap();

        let result = FileOwnerStore::new(&path).load();
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn clear_forgets_owner() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileOwnerStore::new(dir.path().join("owner.cbor"));

        store.store(&pattern("device/alice")).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}
