//! Read-only config lookup.
//!
//! The upgrade engine and status prober only ever read configuration, so
//! they depend on this trait rather than on the store directly.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::StateResult;
use crate::store::StateStore;

/// Maps a config key to its value.
pub trait ConfigLookup: Send + Sync {
    fn lookup(&self, key: &str) -> StateResult<Option<String>>;
}

impl ConfigLookup for StateStore {
    fn lookup(&self, key: &str) -> StateResult<Option<String>> {
        self.get_config(key)
    }
}

/// Fixed in-memory entries, e.g. the `[settings]` table of `oms.toml`.
#[derive(Debug, Clone, Default)]
pub struct StaticConfig {
    entries: BTreeMap<String, String>,
}

impl StaticConfig {
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.entries.insert(key.to_string(), value.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ConfigLookup for StaticConfig {
    fn lookup(&self, key: &str) -> StateResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }
}

/// Consults each source in order and returns the first hit.
#[derive(Clone, Default)]
pub struct ChainedLookup {
    sources: Vec<Arc<dyn ConfigLookup>>,
}

impl ChainedLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, source: Arc<dyn ConfigLookup>) -> Self {
        self.sources.push(source);
        self
    }
}

impl ConfigLookup for ChainedLookup {
    fn lookup(&self, key: &str) -> StateResult<Option<String>> {
        for source in &self.sources {
            if let Some(value) = source.lookup(key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_config_lookup() {
        let config = StaticConfig::default().with("WCS_INSTALL_PATH", "/data/wcs");
        assert_eq!(config.lookup("WCS_INSTALL_PATH").unwrap().as_deref(), Some("/data/wcs"));
        assert!(config.lookup("WMS_INSTALL_PATH").unwrap().is_none());
    }

    #[test]
    fn chained_lookup_prefers_earlier_sources() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_config("WCS_INSTALL_PATH", "/from/store").unwrap();
        store.put_config("WCS_DEPLOY_SHELL", "/from/store/wcs.sh").unwrap();

        let lookup = ChainedLookup::new()
            .then(Arc::new(StaticConfig::default().with("WCS_INSTALL_PATH", "/from/file")))
            .then(Arc::new(store));

        assert_eq!(lookup.lookup("WCS_INSTALL_PATH").unwrap().as_deref(), Some("/from/file"));
        assert_eq!(
            lookup.lookup("WCS_DEPLOY_SHELL").unwrap().as_deref(),
            Some("/from/store/wcs.sh")
        );
        assert!(lookup.lookup("NOPE").unwrap().is_none());
    }
}
