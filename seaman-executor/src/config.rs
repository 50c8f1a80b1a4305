//! Manager configuration.

use std::time::Duration;

use seaman_core::state::DEFAULT_HISTORY_LIMIT;
use seaman_core::tags::CRATE_NAME;

/// Environment variable overriding the target namespace.
pub const NAMESPACE_ENV: &str = "ABLE_SEAMAN_NAMESPACE";

/// Environment variable overriding the lock timeout, in seconds.
pub const LOCK_TIMEOUT_ENV: &str = "ABLE_SEAMAN_LOCK_TIMEOUT_SECS";

/// Default time to wait for a release lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Which namespace releases are deployed to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NamespaceMode {
    /// The namespace of the current kubeconfig context.
    #[default]
    Default,
    /// An explicitly chosen namespace.
    Specific(String),
}

impl NamespaceMode {
    /// `Specific` for `Some`, `Default` for `None`.
    #[must_use]
    pub fn new(namespace: Option<String>) -> Self {
        namespace.map_or(NamespaceMode::Default, NamespaceMode::Specific)
    }
}

/// Settings shared by every manager operation.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ManagerConfig {
    /// Target namespace.
    pub namespace: NamespaceMode,

    /// Field manager name used for server-side apply.
    pub field_manager: String,

    /// How long to wait for a competing deployer to release the lock.
    pub lock_timeout: Duration,

    /// Number of past revisions kept in the release state.
    pub history_limit: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            namespace: NamespaceMode::Default,
            field_manager: CRATE_NAME.to_owned(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl ManagerConfig {
    /// Defaults overridden by [`NAMESPACE_ENV`] and [`LOCK_TIMEOUT_ENV`].
    ///
    /// Unparseable timeouts are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(namespace) = lookup(NAMESPACE_ENV).filter(|ns| !ns.is_empty()) {
            config.namespace = NamespaceMode::Specific(namespace);
        }
        if let Some(raw) = lookup(LOCK_TIMEOUT_ENV) {
            match raw.parse::<u64>() {
                Ok(secs) => config.lock_timeout = Duration::from_secs(secs),
                Err(e) => {
                    tracing::warn!(value = %raw, error = %e, "ignoring invalid {LOCK_TIMEOUT_ENV}");
                }
            }
        }
        config
    }

    /// Overrides the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: NamespaceMode) -> Self {
        self.namespace = namespace;
        self
    }

    /// Overrides the lock timeout.
    #[must_use]
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Overrides the history limit.
    #[must_use]
    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = ManagerConfig::default();
        assert_eq!(config.namespace, NamespaceMode::Default);
        assert_eq!(config.field_manager, "able-seaman");
        assert_eq!(config.lock_timeout, Duration::from_secs(60));
        assert_eq!(config.history_limit, 10);
    }

    #[test]
    fn env_overrides_namespace_and_timeout() {
        let vars = [(NAMESPACE_ENV, "staging"), (LOCK_TIMEOUT_ENV, "5")];
        let config = ManagerConfig::from_lookup(lookup(&vars));
        assert_eq!(config.namespace, NamespaceMode::Specific("staging".to_owned()));
        assert_eq!(config.lock_timeout, Duration::from_secs(5));
    }

    #[test]
    fn invalid_timeout_keeps_default() {
        let config = ManagerConfig::from_lookup(lookup(&[(LOCK_TIMEOUT_ENV, "soon")]));
        assert_eq!(config.lock_timeout, DEFAULT_LOCK_TIMEOUT);
    }

    #[test]
    fn empty_namespace_is_default() {
        let config = ManagerConfig::from_lookup(lookup(&[(NAMESPACE_ENV, "")]));
        assert_eq!(config.namespace, NamespaceMode::Default);
    }

    #[test]
    fn namespace_mode_new_maps_option() {
        assert_eq!(NamespaceMode::new(None), NamespaceMode::Default);
        assert_eq!(
            NamespaceMode::new(Some("prod".to_owned())),
            NamespaceMode::Specific("prod".to_owned())
        );
    }
}
