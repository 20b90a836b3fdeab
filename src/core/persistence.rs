//! Writes the chat list, credentials and model catalog to durable storage
//! and reads them back at startup.
//!
//! Each collection is its own record. A record is rewritten in full whenever
//! its collection changes and deleted when the collection becomes empty, so
//! an absent record always means "nothing stored". Records are loaded
//! independently: one corrupt record never prevents the others from loading.
//! A record that could not be read is left alone for the rest of the run so
//! its contents can still be recovered by hand.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::core::chat::Chat;
use crate::core::credentials::{CatalogEntry, Credential, CredentialRegistry};
use crate::core::storage::{KeyValueStore, StoreError};

pub const CHATS_KEY: &str = "chats";
pub const CREDENTIALS_KEY: &str = "credentials";
pub const CATALOG_KEY: &str = "catalog";

/// Everything read back from storage at startup.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub chats: Vec<Chat>,
    pub credentials: HashMap<String, Credential>,
    pub catalog: Vec<CatalogEntry>,
    /// Records that could not be read; their collections start empty.
    pub failures: Vec<StoreError>,
}

pub struct Persistence {
    records: Box<dyn KeyValueStore>,
    secrets: Box<dyn KeyValueStore>,
    /// Records that failed to load and must not be overwritten.
    unreadable: HashSet<&'static str>,
}

impl Persistence {
    /// `records` holds chats and the catalog; `secrets` holds credentials.
    pub fn new(records: Box<dyn KeyValueStore>, secrets: Box<dyn KeyValueStore>) -> Self {
        Self {
            records,
            secrets,
            unreadable: HashSet::new(),
        }
    }

    /// Read every record. Records that fail are reported in
    /// [`Snapshot::failures`] and are not written again by this instance.
    ///
    /// The catalog is only meaningful next to its credentials, so an
    /// unreadable credentials record also protects the catalog record.
    pub fn load(&mut self) -> Snapshot {
        let mut snapshot = Snapshot::default();

        match read_record::<Vec<Chat>>(self.records.as_ref(), CHATS_KEY) {
            Ok(chats) => snapshot.chats = chats.unwrap_or_default(),
            Err(err) => {
                self.unreadable.insert(CHATS_KEY);
                snapshot.failures.push(err);
            }
        }
        match read_record::<HashMap<String, Credential>>(self.secrets.as_ref(), CREDENTIALS_KEY) {
            Ok(credentials) => snapshot.credentials = credentials.unwrap_or_default(),
            Err(err) => {
                self.unreadable.insert(CREDENTIALS_KEY);
                self.unreadable.insert(CATALOG_KEY);
                snapshot.failures.push(err);
            }
        }
        match read_record::<Vec<CatalogEntry>>(self.records.as_ref(), CATALOG_KEY) {
            Ok(catalog) => snapshot.catalog = catalog.unwrap_or_default(),
            Err(err) => {
                self.unreadable.insert(CATALOG_KEY);
                snapshot.failures.push(err);
            }
        }

        for failure in &snapshot.failures {
            warn!(error = %failure, "skipping unreadable record");
        }
        debug!(
            chats = snapshot.chats.len(),
            credentials = snapshot.credentials.len(),
            catalog = snapshot.catalog.len(),
            "loaded snapshot"
        );
        snapshot
    }

    /// Whether `key` failed to load and is being left untouched.
    pub fn is_protected(&self, key: &str) -> bool {
        self.unreadable.contains(key)
    }

    pub fn save_chats(&mut self, chats: &[Chat]) -> Result<(), StoreError> {
        if self.skip_write(CHATS_KEY) {
            return Ok(());
        }
        write_record(self.records.as_mut(), CHATS_KEY, chats, chats.is_empty())
    }

    pub fn save_credentials(
        &mut self,
        credentials: &HashMap<String, Credential>,
    ) -> Result<(), StoreError> {
        if self.skip_write(CREDENTIALS_KEY) {
            return Ok(());
        }
        // Sorted so the stored record is stable between writes.
        let sorted: BTreeMap<&String, &Credential> = credentials.iter().collect();
        write_record(
            self.secrets.as_mut(),
            CREDENTIALS_KEY,
            &sorted,
            sorted.is_empty(),
        )
    }

    pub fn save_catalog(&mut self, catalog: &[CatalogEntry]) -> Result<(), StoreError> {
        if self.skip_write(CATALOG_KEY) {
            return Ok(());
        }
        write_record(self.records.as_mut(), CATALOG_KEY, catalog, catalog.is_empty())
    }

    /// Write both halves of the registry. Both writes are attempted even if
    /// the first one fails; the first error is returned.
    pub fn save_registry(&mut self, registry: &CredentialRegistry) -> Result<(), StoreError> {
        let credentials = self.save_credentials(registry.credentials());
        let catalog = self.save_catalog(registry.catalog());
        credentials.and(catalog)
    }

    fn skip_write(&self, key: &str) -> bool {
        let protected = self.is_protected(key);
        if protected {
            warn!(key, "not overwriting a record that failed to load");
        }
        protected
    }
}

fn read_record<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| StoreError::Parse {
            key: key.to_string(),
            source,
        })
}

fn write_record<T: Serialize + ?Sized>(
    store: &mut dyn KeyValueStore,
    key: &str,
    value: &T,
    is_empty: bool,
) -> Result<(), StoreError> {
    if is_empty {
        return store.remove(key);
    }
    let encoded = serde_json::to_string(value).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &encoded)
}
