// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Codec limits and policy, plus the storage port used to persist them.
//!
//! The process-wide [`CodecConfig`] is installed at most once, before the first
//! schema is built; schemas and cursors read it at construction time.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Default maximum nesting depth of messages.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Default maximum length of a single length-delimited payload (64 MiB).
pub const DEFAULT_MAX_LENGTH: usize = 64 << 20;

/// Limits and field-mapping policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Maximum nesting depth accepted on read and produced on write.
    pub max_depth: usize,
    /// Maximum declared length of a length-delimited payload.
    pub max_length: usize,
    /// Element type names the field factory refuses to map.
    pub excluded_types: BTreeSet<String>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_length: DEFAULT_MAX_LENGTH,
            excluded_types: BTreeSet::new(),
        }
    }
}

impl CodecConfig {
    /// Rejects limits that would make every message unreadable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be at least 1".into()));
        }
        if self.max_length == 0 {
            return Err(ConfigError::Invalid("max_length must be at least 1".into()));
        }
        Ok(())
    }

    /// Returns `true` if the factory must not map elements named `type_name`.
    pub fn is_excluded(&self, type_name: &str) -> bool {
        self.excluded_types.contains(type_name)
    }
}

static CONFIG: OnceLock<CodecConfig> = OnceLock::new();

/// Installs the process-wide configuration.
///
/// Fails if a configuration was already installed or read through
/// [`current`]; schemas built before installation would otherwise disagree
/// with later ones.
pub fn install(config: CodecConfig) -> Result<(), ConfigError> {
    config.validate()?;
    CONFIG.set(config).map_err(|_| ConfigError::AlreadyInstalled)?;
    info!("codec configuration installed");
    Ok(())
}

/// The process-wide configuration (defaults when none was installed).
pub fn current() -> &'static CodecConfig {
    CONFIG.get_or_init(CodecConfig::default)
}

/// Storage port for raw config blobs (keyed by logical name).
pub trait ConfigStore {
    /// Load a raw config blob. Returns `NotFound` when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persist a raw config blob.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Error type for config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key not present in store.
    #[error("not found")]
    NotFound,
    /// I/O error while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Loaded values are out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// The process-wide configuration is already fixed.
    #[error("codec configuration already installed")]
    AlreadyInstalled,
    /// Catch-all error variant.
    #[error("other: {0}")]
    Other(String),
}

/// Serializes config values as JSON and delegates storage to a [`ConfigStore`].
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Create a new service using the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Consume the service and return the inner store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S> ConfigService<S>
where
    S: ConfigStore,
{
    /// Key under which [`CodecConfig`] is stored.
    pub const CODEC_KEY: &'static str = "codec";

    /// Load and deserialize a config value for `key`. Returns `Ok(None)` if missing.
    pub fn load<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: DeserializeOwned,
    {
        match self.store.load_raw(key) {
            Ok(bytes) => {
                if bytes.is_empty() {
                    return Ok(None);
                }
                let value = serde_json::from_slice(&bytes)?;
                Ok(Some(value))
            }
            Err(ConfigError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Serialize and persist a config value for `key`.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), ConfigError>
    where
        T: Serialize,
    {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }

    /// Loads the stored codec configuration, falling back to defaults, and validates it.
    pub fn load_codec(&self) -> Result<CodecConfig, ConfigError> {
        let config = self
            .load::<CodecConfig>(Self::CODEC_KEY)?
            .unwrap_or_default();
        config.validate()?;
        Ok(config)
    }
}

/// Stores configs as JSON files under one directory.
#[derive(Debug, Clone)]
pub struct DirConfigStore {
    base: PathBuf,
}

impl DirConfigStore {
    /// Creates a store rooted at `base`; the directory is created on first save.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Creates a store under the user config directory (e.g. `~/.config/echo-wire`).
    pub fn platform() -> Result<Self, ConfigError> {
        let proj = ProjectDirs::from("dev", "flyingrobots", "echo-wire")
            .ok_or_else(|| ConfigError::Other("could not resolve config dir".into()))?;
        Ok(Self::new(proj.config_dir()))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.json"))
    }
}

impl ConfigStore for DirConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }
}
