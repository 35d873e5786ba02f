//! The Wrapper Registry & Credential Binder (spec §4.5): instantiates only
//! the wrappers whose API key is available from an injected [`KeyProvider`].

use crate::wrapper::sciencedirect::ScienceDirectWrapper;
use crate::wrapper::scopus::ScopusWrapper;
use crate::wrapper::springer::SpringerWrapper;
use crate::wrapper::Wrapper;

/// Looks up credentials by the deterministic name
/// `<TYPE_NAME_WITHOUT_WRAPPER_SUFFIX_UPPER>_API_KEY` (spec §4.5). An
/// environment-backed implementation and an in-memory map are both useful:
/// env for a real deployment, a map for tests.
pub trait KeyProvider: Send + Sync {
    /// Returns the API key for `key_name`, if one is configured.
    fn key_for(&self, key_name: &str) -> Option<String>;
}

/// Reads credentials from process environment variables.
pub struct EnvKeyProvider;

impl KeyProvider for EnvKeyProvider {
    fn key_for(&self, key_name: &str) -> Option<String> {
        std::env::var(key_name).ok()
    }
}

/// An in-memory `KeyProvider`, useful for tests and for callers that source
/// credentials from a user record rather than the environment.
#[derive(Default)]
pub struct MapKeyProvider {
    keys: std::collections::BTreeMap<String, String>,
}

impl MapKeyProvider {
    /// Builds an empty provider.
    pub fn new() -> Self {
        MapKeyProvider::default()
    }

    /// Registers a key under `key_name`.
    pub fn with_key(mut self, key_name: impl Into<String>, value: impl Into<String>) -> Self {
        self.keys.insert(key_name.into(), value.into());
        self
    }
}

impl KeyProvider for MapKeyProvider {
    fn key_for(&self, key_name: &str) -> Option<String> {
        self.keys.get(key_name).cloned()
    }
}

/// The set of active wrappers for one federated call, in a fixed registry
/// order (spec §4.6's ordering guarantee is downstream of this order).
pub struct Registry {
    wrappers: Vec<Box<dyn Wrapper>>,
}

impl Registry {
    /// Builds a registry, instantiating only the wrappers whose credential
    /// is present; the rest are `log::debug!`-logged as dropped (spec
    /// §4.5). Intended to be constructed once per service start and cached
    /// behind a `OnceLock` at the call site, not at import time.
    pub fn build(key_provider: &dyn KeyProvider) -> Registry {
        let mut wrappers: Vec<Box<dyn Wrapper>> = Vec::new();

        match key_provider.key_for("SPRINGER_API_KEY") {
            Some(key) => wrappers.push(Box::new(SpringerWrapper::new(key))),
            None => log::debug!("dropping springer wrapper: SPRINGER_API_KEY not configured"),
        }
        match key_provider.key_for("SCOPUS_API_KEY") {
            Some(key) => wrappers.push(Box::new(ScopusWrapper::new(key))),
            None => log::debug!("dropping scopus wrapper: SCOPUS_API_KEY not configured"),
        }
        match key_provider.key_for("SCIENCEDIRECT_API_KEY") {
            Some(key) => wrappers.push(Box::new(ScienceDirectWrapper::new(key))),
            None => log::debug!("dropping sciencedirect wrapper: SCIENCEDIRECT_API_KEY not configured"),
        }

        Registry { wrappers }
    }

    /// The active wrappers, in registry order.
    pub fn wrappers(&self) -> &[Box<dyn Wrapper>] {
        &self.wrappers
    }

    /// `true` if no wrapper has a configured credential.
    pub fn is_empty(&self) -> bool {
        self.wrappers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_wrappers_with_no_configured_key() {
        let provider = MapKeyProvider::new().with_key("SPRINGER_API_KEY", "abc");
        let registry = Registry::build(&provider);
        assert_eq!(registry.wrappers().len(), 1);
        assert_eq!(registry.wrappers()[0].name(), "springer");
    }

    #[test]
    fn empty_provider_yields_empty_registry() {
        let provider = MapKeyProvider::new();
        let registry = Registry::build(&provider);
        assert!(registry.is_empty());
    }

    #[test]
    fn all_keys_configured_preserves_registry_order() {
        let provider = MapKeyProvider::new()
            .with_key("SPRINGER_API_KEY", "a")
            .with_key("SCOPUS_API_KEY", "b")
            .with_key("SCIENCEDIRECT_API_KEY", "c");
        let registry = Registry::build(&provider);
        let names: Vec<_> = registry.wrappers().iter().map(|w| w.name()).collect();
        assert_eq!(names, vec!["springer", "scopus", "sciencedirect"]);
    }
}
