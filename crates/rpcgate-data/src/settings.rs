//! Connection settings for the PostgreSQL record store.

use std::time::Duration;

use crate::error::{DataError, Result};

/// Environment variable holding the database connection string.
pub const ENV_DATABASE_URL: &str = "RPCGATE_DATABASE_URL";
/// Environment variable overriding the pool size.
pub const ENV_MAX_CONNECTIONS: &str = "RPCGATE_DB_MAX_CONNECTIONS";
/// Environment variable overriding the pool acquire timeout, in seconds.
pub const ENV_ACQUIRE_TIMEOUT_SECS: &str = "RPCGATE_DB_ACQUIRE_TIMEOUT_SECS";
/// Environment variable bounding each statement, in milliseconds.
pub const ENV_STATEMENT_DEADLINE_MS: &str = "RPCGATE_DB_STATEMENT_DEADLINE_MS";

const DEFAULT_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Pool and statement settings used by [`crate::PgRecordStore::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// How long to wait for a pooled connection.
    pub acquire_timeout: Duration,
    /// Optional upper bound applied to every store operation.
    pub statement_deadline: Option<Duration>,
}

impl StoreSettings {
    /// Settings with defaults for everything but the connection string.
    #[must_use]
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            statement_deadline: None,
        }
    }

    /// Build settings from raw values keyed by the `ENV_*` variable names.
    ///
    /// Absent numeric keys keep their defaults; present ones must be positive integers.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidSetting`] when the URL is missing or a numeric override
    /// does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup(ENV_DATABASE_URL)
            .filter(|url| !url.trim().is_empty())
            .ok_or(DataError::InvalidSetting {
                variable: ENV_DATABASE_URL,
                reason: "must be set",
            })?;
        let mut settings = Self::new(database_url);

        if let Some(raw) = lookup(ENV_MAX_CONNECTIONS) {
            settings.max_connections = parse_positive(ENV_MAX_CONNECTIONS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_ACQUIRE_TIMEOUT_SECS) {
            let secs: u64 = parse_positive(ENV_ACQUIRE_TIMEOUT_SECS, &raw)?;
            settings.acquire_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup(ENV_STATEMENT_DEADLINE_MS) {
            let millis: u64 = parse_positive(ENV_STATEMENT_DEADLINE_MS, &raw)?;
            settings.statement_deadline = Some(Duration::from_millis(millis));
        }

        Ok(settings)
    }
}

fn parse_positive<T>(variable: &'static str, raw: &str) -> Result<T>
where
    T: std::str::FromStr + Default + PartialEq,
{
    let parsed = raw
        .trim()
        .parse::<T>()
        .map_err(|_| DataError::InvalidSetting {
            variable,
            reason: "must be a positive integer",
        })?;
    if parsed == T::default() {
        return Err(DataError::InvalidSetting {
            variable,
            reason: "must be a positive integer",
        });
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_url_is_set() {
        let settings =
            StoreSettings::from_lookup(lookup_from(&[(ENV_DATABASE_URL, "postgres://db")]))
                .expect("settings should parse");
        assert_eq!(settings, StoreSettings::new("postgres://db"));
        assert_eq!(settings.max_connections, 8);
        assert_eq!(settings.acquire_timeout, Duration::from_secs(10));
        assert!(settings.statement_deadline.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let settings = StoreSettings::from_lookup(lookup_from(&[
            (ENV_DATABASE_URL, "postgres://db"),
            (ENV_MAX_CONNECTIONS, "3"),
            (ENV_ACQUIRE_TIMEOUT_SECS, " 2 "),
            (ENV_STATEMENT_DEADLINE_MS, "1500"),
        ]))
        .expect("settings should parse");
        assert_eq!(settings.max_connections, 3);
        assert_eq!(settings.acquire_timeout, Duration::from_secs(2));
        assert_eq!(
            settings.statement_deadline,
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn missing_url_is_rejected() {
        let err = StoreSettings::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(
            err,
            DataError::InvalidSetting {
                variable: ENV_DATABASE_URL,
                ..
            }
        ));
    }

    #[test]
    fn zero_and_garbage_overrides_are_rejected() {
        for raw in ["0", "-1", "many"] {
            let err = StoreSettings::from_lookup(lookup_from(&[
                (ENV_DATABASE_URL, "postgres://db"),
                (ENV_MAX_CONNECTIONS, raw),
            ]))
            .unwrap_err();
            assert!(matches!(
                err,
                DataError::InvalidSetting {
                    variable: ENV_MAX_CONNECTIONS,
                    ..
                }
            ));
        }
    }
}
