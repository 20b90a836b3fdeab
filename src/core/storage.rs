//! Durable key-value media.
//!
//! Records are opaque strings addressed by a short key. A missing key means
//! "no data"; stores never invent empty values for absent keys.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use keyring::Entry;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::core::config::data::path_display;

const KEYRING_SERVICE: &str = "confab";

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    Io { path: PathBuf, source: io::Error },
    /// The platform keyring refused the operation.
    ///
    /// Recoverable failures mean the backend was temporarily unavailable
    /// (locked or unreachable); anything else is reported as permanent.
    Keyring {
        key: String,
        recoverable: bool,
        source: keyring::Error,
    },
    /// A stored record is not valid JSON for its collection.
    Parse {
        key: String,
        source: serde_json::Error,
    },
    /// A collection could not be encoded for storage.
    Encode {
        key: String,
        source: serde_json::Error,
    },
}

impl StoreError {
    fn keyring(key: &str, source: keyring::Error) -> Self {
        let recoverable = matches!(
            source,
            keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_)
        );
        StoreError::Keyring {
            key: key.to_string(),
            recoverable,
            source,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StoreError::Keyring {
                recoverable: true,
                ..
            }
        )
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io { path, source } => {
                write!(f, "Storage error at {}: {}", path_display(path), source)
            }
            StoreError::Keyring { key, source, .. } => {
                write!(f, "Keyring error for '{key}': {source}")
            }
            StoreError::Parse { key, source } => {
                write!(f, "Stored '{key}' record is corrupt: {source}")
            }
            StoreError::Encode { key, source } => {
                write!(f, "Failed to encode '{key}' record: {source}")
            }
        }
    }
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StoreError::Io { source, .. } => Some(source),
            StoreError::Keyring { source, .. } => Some(source),
            StoreError::Parse { source, .. } | StoreError::Encode { source, .. } => Some(source),
        }
    }
}

/// One `<key>.json` file per record inside a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let io_err = |source: io::Error| StoreError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let mut temp_file = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        temp_file.write_all(value.as_bytes()).map_err(io_err)?;
        temp_file.as_file_mut().sync_all().map_err(io_err)?;
        temp_file
            .persist(&path)
            .map_err(|err| io_err(err.error))?;
        debug!(path = %path.display(), bytes = value.len(), "wrote record");
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

/// Records kept in the platform keyring, one entry per key.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(KEYRING_SERVICE)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Entry::new(&self.service, key).map_err(|err| StoreError::keyring(key, err))
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(StoreError::keyring(key, err)),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|err| StoreError::keyring(key, err))
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(StoreError::keyring(key, err)),
        }
    }
}

/// Process-local store used for `--memory` sessions and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.records.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.records.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.records.remove(key);
        Ok(())
    }
}
