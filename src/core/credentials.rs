//! Credential registry and model catalog.
//!
//! Both collections are keyed by model id and are only ever changed
//! together: every catalog entry has a credential and every credential has
//! a catalog entry.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::providers::Provider;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub model_id: String,
    pub provider: Provider,
    pub secret: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub display_name: String,
    pub provider: Provider,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    MissingModelId,
    MissingSecret,
    UnknownProvider(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::MissingModelId => write!(f, "A model id is required"),
            RegistryError::MissingSecret => write!(f, "An API key is required"),
            RegistryError::UnknownProvider(tag) => {
                let known: Vec<&str> = Provider::ALL.iter().map(|p| p.id()).collect();
                write!(
                    f,
                    "Unknown provider '{tag}' (expected one of: {})",
                    known.join(", ")
                )
            }
        }
    }
}

impl Error for RegistryError {}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CredentialRegistry {
    credentials: HashMap<String, Credential>,
    catalog: Vec<CatalogEntry>,
}

impl CredentialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the joined pair from independently persisted halves.
    ///
    /// Catalog entries without a credential are dropped. Credentials missing
    /// from the catalog are appended in model-id order.
    pub fn from_parts(credentials: HashMap<String, Credential>, catalog: Vec<CatalogEntry>) -> Self {
        let mut registry = Self::new();

        for entry in catalog {
            match credentials.get(&entry.id) {
                Some(credential) if !registry.contains(&entry.id) => {
                    registry.catalog.push(CatalogEntry {
                        id: entry.id.clone(),
                        display_name: credential.display_name.clone(),
                        provider: credential.provider,
                    });
                }
                Some(_) => warn!(model_id = %entry.id, "dropping duplicate catalog entry"),
                None => warn!(model_id = %entry.id, "dropping catalog entry without a credential"),
            }
        }

        let mut orphans: Vec<&Credential> = credentials
            .values()
            .filter(|credential| !registry.contains(&credential.model_id))
            .collect();
        orphans.sort_by(|a, b| a.model_id.cmp(&b.model_id));
        for credential in orphans {
            warn!(model_id = %credential.model_id, "restoring catalog entry for stored credential");
            registry.catalog.push(catalog_entry(credential));
        }

        registry.credentials = credentials
            .into_values()
            .map(|credential| (credential.model_id.clone(), credential))
            .collect();
        registry
    }

    /// Store a credential, adding a catalog entry when the model is new.
    ///
    /// Returns `true` when the model was not configured before.
    pub fn add_credential(
        &mut self,
        provider: Provider,
        model_id: &str,
        secret: &str,
        display_name: &str,
    ) -> Result<bool, RegistryError> {
        let model_id = model_id.trim();
        let secret = secret.trim();
        if model_id.is_empty() {
            return Err(RegistryError::MissingModelId);
        }
        if secret.is_empty() {
            return Err(RegistryError::MissingSecret);
        }
        let display_name = match display_name.trim() {
            "" => model_id,
            name => name,
        };

        let credential = Credential {
            model_id: model_id.to_string(),
            provider,
            secret: secret.to_string(),
            display_name: display_name.to_string(),
        };

        let is_new = match self.catalog.iter_mut().find(|entry| entry.id == model_id) {
            Some(entry) => {
                *entry = catalog_entry(&credential);
                false
            }
            None => {
                self.catalog.push(catalog_entry(&credential));
                true
            }
        };
        self.credentials.insert(credential.model_id.clone(), credential);
        Ok(is_new)
    }

    /// Remove a model and its credential. Returns whether anything was removed.
    pub fn remove_model(&mut self, model_id: &str) -> bool {
        let before = self.catalog.len();
        self.catalog.retain(|entry| entry.id != model_id);
        let removed_credential = self.credentials.remove(model_id).is_some();
        removed_credential || self.catalog.len() != before
    }

    pub fn credential(&self, model_id: &str) -> Option<&Credential> {
        self.credentials.get(model_id)
    }

    pub fn entry(&self, model_id: &str) -> Option<&CatalogEntry> {
        self.catalog.iter().find(|entry| entry.id == model_id)
    }

    pub fn display_name(&self, model_id: &str) -> Option<&str> {
        self.entry(model_id).map(|entry| entry.display_name.as_str())
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.entry(model_id).is_some()
    }

    pub fn catalog(&self) -> &[CatalogEntry] {
        &self.catalog
    }

    pub fn credentials(&self) -> &HashMap<String, Credential> {
        &self.credentials
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }
}

fn catalog_entry(credential: &Credential) -> CatalogEntry {
    CatalogEntry {
        id: credential.model_id.clone(),
        display_name: credential.display_name.clone(),
        provider: credential.provider,
    }
}
