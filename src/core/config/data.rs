use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::core::config::io::ConfigError;
use crate::core::providers::Provider;
use crate::utils::url::normalize_base_url;

/// Number of trailing messages sent as context when nothing is configured.
pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// Medium that holds the credentials record.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStoreKind {
    /// A JSON file next to the chat records.
    #[default]
    File,
    /// The platform keyring.
    Keyring,
}

impl fmt::Display for CredentialStoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialStoreKind::File => write!(f, "file"),
            CredentialStoreKind::Keyring => write!(f, "keyring"),
        }
    }
}

impl FromStr for CredentialStoreKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(CredentialStoreKind::File),
            "keyring" => Ok(CredentialStoreKind::Keyring),
            other => Err(format!("expected 'file' or 'keyring', got '{other}'")),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Model selected at startup when the first chat has none bound.
    pub default_model: Option<String>,
    /// Trailing messages sent with each request.
    pub window_size: Option<usize>,
    pub credential_store: Option<CredentialStoreKind>,
    /// Where chat, catalog and (file-backed) credential records live.
    pub data_dir: Option<PathBuf>,
    pub request_timeout_secs: Option<u64>,
    /// Base URL overrides keyed by provider tag (e.g. "openai").
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub base_urls: BTreeMap<String, String>,
}

/// Keys accepted by `confab set` and `confab unset`.
pub const SETTING_KEYS: &[&str] = &[
    "default-model",
    "window-size",
    "credential-store",
    "data-dir",
    "request-timeout",
    "base-url.<provider>",
];

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
///
/// # Examples
/// - Unix: `/home/user/.local/share/confab` → `~/.local/share/confab`
/// - macOS: `/Users/user/Library/Application Support/...` → `~/Library/Application Support/...`
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

impl Config {
    pub fn window_size(&self) -> usize {
        self.window_size.unwrap_or(DEFAULT_WINDOW_SIZE)
    }

    pub fn credential_store(&self) -> CredentialStoreKind {
        self.credential_store.unwrap_or_default()
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Base URL overrides with provider tags resolved. Unknown tags are
    /// rejected when set, so any left in a hand-edited file are skipped.
    pub fn provider_base_urls(&self) -> HashMap<Provider, String> {
        self.base_urls
            .iter()
            .filter_map(|(tag, url)| {
                let provider = tag.parse::<Provider>().ok();
                if provider.is_none() {
                    tracing::warn!(provider = %tag, "ignoring base URL for unknown provider");
                }
                provider.map(|provider| (provider, normalize_base_url(url)))
            })
            .collect()
    }

    /// Apply `confab set <key> <value>`.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let invalid = |reason: String| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason,
        };
        if value.is_empty() {
            return Err(invalid("value cannot be empty".to_string()));
        }

        match key {
            "default-model" => self.default_model = Some(value.to_string()),
            "window-size" => {
                let size = value
                    .parse::<usize>()
                    .map_err(|err| invalid(err.to_string()))?;
                if size == 0 {
                    return Err(invalid("must be at least 1".to_string()));
                }
                self.window_size = Some(size);
            }
            "credential-store" => self.credential_store = Some(value.parse().map_err(invalid)?),
            "data-dir" => self.data_dir = Some(PathBuf::from(value)),
            "request-timeout" => {
                let secs = value
                    .parse::<u64>()
                    .map_err(|err| invalid(err.to_string()))?;
                self.request_timeout_secs = Some(secs);
            }
            _ => {
                let Some(tag) = key.strip_prefix("base-url.") else {
                    return Err(ConfigError::UnknownKey(key.to_string()));
                };
                let provider = tag
                    .parse::<Provider>()
                    .map_err(|err| invalid(err.to_string()))?;
                if !value.starts_with("http://") && !value.starts_with("https://") {
                    return Err(invalid("expected an http:// or https:// URL".to_string()));
                }
                self.base_urls
                    .insert(provider.id().to_string(), value.to_string());
            }
        }
        Ok(())
    }

    /// Apply `confab unset <key>`.
    pub fn unset_value(&mut self, key: &str) -> Result<(), ConfigError> {
        match key {
            "default-model" => self.default_model = None,
            "window-size" => self.window_size = None,
            "credential-store" => self.credential_store = None,
            "data-dir" => self.data_dir = None,
            "request-timeout" => self.request_timeout_secs = None,
            _ => {
                let Some(tag) = key.strip_prefix("base-url.") else {
                    return Err(ConfigError::UnknownKey(key.to_string()));
                };
                self.base_urls.remove(&tag.to_ascii_lowercase());
            }
        }
        Ok(())
    }
}
