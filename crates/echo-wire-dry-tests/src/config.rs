// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory config store fake for testing without filesystem I/O.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use echo_wire::config::{CodecConfig, ConfigError, ConfigService, ConfigStore};

/// In-memory implementation of [`ConfigStore`] for testing.
///
/// Clones share state, so a test can hand one clone to a [`ConfigService`]
/// and inspect call counts through another.
///
/// ```
/// use echo_wire::config::{CodecConfig, ConfigService};
/// use echo_wire_dry_tests::InMemoryConfigStore;
///
/// let store = InMemoryConfigStore::new();
/// let service = ConfigService::new(store.clone());
/// assert_eq!(service.load_codec().unwrap(), CodecConfig::default());
/// assert_eq!(store.load_count(), 1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryConfigStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    data: HashMap<String, Vec<u8>>,
    load_count: usize,
    save_count: usize,
    fail_on_load: bool,
    fail_on_save: bool,
}

impl InMemoryConfigStore {
    /// Create a new empty in-memory config store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `config` under the codec key.
    pub fn with_codec(config: &CodecConfig) -> Result<Self, ConfigError> {
        let store = Self::new();
        ConfigService::new(store.clone())
            .save(ConfigService::<Self>::CODEC_KEY, config)?;
        store.lock().save_count = 0;
        Ok(store)
    }

    /// Store raw bytes under `key` without counting a save.
    pub fn insert_raw(&self, key: &str, data: &[u8]) {
        self.lock().data.insert(key.to_owned(), data.to_vec());
    }

    /// Configure the store to fail on load operations.
    pub fn set_fail_on_load(&self, fail: bool) {
        self.lock().fail_on_load = fail;
    }

    /// Configure the store to fail on save operations.
    pub fn set_fail_on_save(&self, fail: bool) {
        self.lock().fail_on_save = fail;
    }

    /// Number of `load_raw` calls, failed ones included.
    pub fn load_count(&self) -> usize {
        self.lock().load_count
    }

    /// Number of `save_raw` calls, failed ones included.
    pub fn save_count(&self) -> usize {
        self.lock().save_count
    }

    /// Check if a key exists in the store.
    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().data.contains_key(key)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let mut inner = self.lock();
        inner.load_count += 1;

        if inner.fail_on_load {
            return Err(ConfigError::Other("simulated load failure".into()));
        }

        inner.data.get(key).cloned().ok_or(ConfigError::NotFound)
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let mut inner = self.lock();
        inner.save_count += 1;

        if inner.fail_on_save {
            return Err(ConfigError::Other("simulated save failure".into()));
        }

        inner.data.insert(key.to_string(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn with_codec_is_loadable_and_uncounted() {
        let config = CodecConfig {
            max_depth: 7,
            ..CodecConfig::default()
        };
        let store = InMemoryConfigStore::with_codec(&config).unwrap();
        assert_eq!(store.save_count(), 0);
        let service = ConfigService::new(store.clone());
        assert_eq!(service.load_codec().unwrap(), config);
        assert_eq!(store.load_count(), 1);
    }

    #[test]
    fn failures_are_counted_and_store_nothing() {
        let store = InMemoryConfigStore::new();
        store.set_fail_on_save(true);
        assert!(matches!(
            store.save_raw("codec", b"{}"),
            Err(ConfigError::Other(_))
        ));
        assert_eq!(store.save_count(), 1);
        assert!(!store.contains_key("codec"));

        store.set_fail_on_load(true);
        assert!(store.load_raw("codec").is_err());
        assert_eq!(store.load_count(), 1);
    }

    #[test]
    fn invalid_stored_limits_are_rejected() {
        let store = InMemoryConfigStore::new();
        store.insert_raw("codec", br#"{"max_length": 0}"#);
        let service = ConfigService::new(store);
        assert!(matches!(service.load_codec(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn malformed_json_is_a_serde_error() {
        let store = InMemoryConfigStore::new();
        store.insert_raw("codec", b"{not json");
        let service = ConfigService::new(store);
        assert!(matches!(service.load_codec(), Err(ConfigError::Serde(_))));
    }
}
