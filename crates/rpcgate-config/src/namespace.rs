//! Namespaced record names: `<reserved-prefix><logical-name>`.
//!
//! # Design
//! - One flat table holds every domain; domains are separated only by their name prefix.
//! - [`NamespaceRegistry`] refuses a prefix that overlaps another prefix or a reserved
//!   singleton key, so a prefix scan for one domain can never return another domain's rows.

use crate::error::{ConfigError, ConfigResult};

/// Prefix of rate-limit strategy records.
pub const RATE_LIMIT_STRATEGY_PREFIX: &str = "ratelimit.strategy.";
/// Prefix of access-control allow-list records.
pub const ACL_ALLOW_LIST_PREFIX: &str = "acl.allowlist.";
/// Prefix of node route group records.
pub const NODE_ROUTE_GROUP_PREFIX: &str = "noderoute.group.";
/// Singleton record holding the chain reorganization generation.
pub const REORG_VERSION_KEY: &str = "reorg.version";

/// Build the record name for `logical_name` under `prefix`.
#[must_use]
pub fn encode(prefix: &str, logical_name: &str) -> String {
    let mut key = String::with_capacity(prefix.len() + logical_name.len());
    key.push_str(prefix);
    key.push_str(logical_name);
    key
}

/// Strip `prefix` from `key`, returning the logical name.
///
/// # Errors
///
/// Returns [`ConfigError::ForeignNamespace`] when `key` lies outside `prefix` and
/// [`ConfigError::EmptyLogicalName`] when nothing follows the prefix.
pub fn decode<'a>(prefix: &'static str, key: &'a str) -> ConfigResult<&'a str> {
    let logical = key
        .strip_prefix(prefix)
        .ok_or_else(|| ConfigError::ForeignNamespace {
            prefix,
            name: key.to_string(),
        })?;
    if logical.is_empty() {
        return Err(ConfigError::EmptyLogicalName {
            prefix,
            name: key.to_string(),
        });
    }
    Ok(logical)
}

/// Registered prefixes and singleton keys sharing the record table.
#[derive(Debug, Clone, Default)]
pub struct NamespaceRegistry {
    prefixes: Vec<&'static str>,
    keys: Vec<&'static str>,
}

impl NamespaceRegistry {
    /// Empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            prefixes: Vec::new(),
            keys: Vec::new(),
        }
    }

    /// Registry holding the gateway's built-in domains and the reorg version key.
    ///
    /// # Errors
    ///
    /// Returns an error only if the built-in namespaces overlap.
    pub fn builtin() -> ConfigResult<Self> {
        let mut registry = Self::new();
        registry.register(RATE_LIMIT_STRATEGY_PREFIX)?;
        registry.register(ACL_ALLOW_LIST_PREFIX)?;
        registry.register(NODE_ROUTE_GROUP_PREFIX)?;
        registry.reserve_key(REORG_VERSION_KEY)?;
        Ok(registry)
    }

    /// Register a domain prefix.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyNamespace`] for an empty prefix and
    /// [`ConfigError::NamespaceConflict`] when the prefix and an existing prefix are
    /// prefixes of each other, or when it would capture a reserved key. Re-registering the same
    /// prefix is a no-op.
    pub fn register(&mut self, prefix: &'static str) -> ConfigResult<()> {
        if prefix.is_empty() {
            return Err(ConfigError::EmptyNamespace);
        }
        if self.prefixes.contains(&prefix) {
            return Ok(());
        }
        if let Some(existing) = self
            .prefixes
            .iter()
            .find(|existing| existing.starts_with(prefix) || prefix.starts_with(**existing))
        {
            return Err(conflict(prefix, existing));
        }
        if let Some(existing) = self.keys.iter().find(|key| key.starts_with(prefix)) {
            return Err(conflict(prefix, existing));
        }
        self.prefixes.push(prefix);
        Ok(())
    }

    /// Reserve a singleton record name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NamespaceConflict`] when the key falls inside a registered prefix.
    pub fn reserve_key(&mut self, key: &'static str) -> ConfigResult<()> {
        if key.is_empty() {
            return Err(ConfigError::EmptyNamespace);
        }
        if let Some(existing) = self.prefixes.iter().find(|prefix| key.starts_with(**prefix)) {
            return Err(conflict(key, existing));
        }
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
        Ok(())
    }

    /// Whether `prefix` has been registered.
    #[must_use]
    pub fn is_registered(&self, prefix: &str) -> bool {
        self.prefixes.iter().any(|registered| *registered == prefix)
    }

    /// Ensure `prefix` is registered before it is used for a scan or write.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnregisteredNamespace`] otherwise.
    pub fn require(&self, prefix: &'static str) -> ConfigResult<()> {
        if self.is_registered(prefix) {
            Ok(())
        } else {
            Err(ConfigError::UnregisteredNamespace { prefix })
        }
    }

    /// Prefix owning `key`, if any.
    #[must_use]
    pub fn namespace_of(&self, key: &str) -> Option<&'static str> {
        self.prefixes
            .iter()
            .copied()
            .find(|prefix| key.starts_with(prefix))
    }
}

fn conflict(candidate: &str, existing: &str) -> ConfigError {
    ConfigError::NamespaceConflict {
        candidate: candidate.to_string(),
        existing: existing.to_string(),
    }
}
