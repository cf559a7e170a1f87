//! Flat configuration records and the repository contract over them.

use std::collections::BTreeMap;
use std::num::IntErrorKind;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::error::{DataError, Result};

/// Surrogate key of a configuration record.
pub type RecordId = i64;

/// Maximum length of a record name in bytes.
pub const MAX_NAME_BYTES: usize = 128;
/// Maximum length of a record value in bytes.
pub const MAX_VALUE_BYTES: usize = 16_250;

/// Raw projection of the `rpcgate_config.configs` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ConfigRecord {
    /// Surrogate key, stable across in-place updates.
    pub id: RecordId,
    /// Globally unique record name (`<prefix><logical-name>`).
    pub name: String,
    /// Raw serialized payload.
    pub value: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last value change.
    pub updated_at: DateTime<Utc>,
}

/// Reject names and values that overflow their column bounds.
///
/// # Errors
///
/// Returns [`DataError::BoundExceeded`] for the first column that overflows.
pub fn ensure_within_bounds(name: &str, value: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_BYTES {
        return Err(DataError::BoundExceeded {
            column: "name",
            limit: MAX_NAME_BYTES,
            actual: name.len(),
        });
    }
    if value.len() > MAX_VALUE_BYTES {
        return Err(DataError::BoundExceeded {
            column: "value",
            limit: MAX_VALUE_BYTES,
            actual: value.len(),
        });
    }
    Ok(())
}

/// Parse the stored text of counter `name` the way the stores' increment does.
///
/// Surrounding whitespace is ignored.
///
/// # Errors
///
/// Returns [`DataError::CounterOverflow`] when the digits do not fit an `i64` and
/// [`DataError::NonNumericCounter`] for anything else that is not a decimal integer.
pub fn parse_counter(name: &str, value: &str) -> Result<i64> {
    value.trim().parse::<i64>().map_err(|err| match err.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => DataError::CounterOverflow {
            name: name.to_string(),
        },
        _ => DataError::NonNumericCounter {
            name: name.to_string(),
            value: Some(value.to_string()),
        },
    })
}

/// Keyed store over configuration records, independent of the policy domains layered on top.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Load the records matching `names`; missing names are absent from the result.
    async fn load_records(&self, names: &[String]) -> Result<Vec<ConfigRecord>>;

    /// Load a single record by its full name.
    async fn load_by_name(&self, name: &str) -> Result<Option<ConfigRecord>>;

    /// Load every record whose name starts with `prefix`, ordered by id.
    async fn load_by_prefix(&self, prefix: &str) -> Result<Vec<ConfigRecord>>;

    /// Load a single record by id.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::RecordNotFound`] when the id is absent.
    async fn load_by_id(&self, id: RecordId) -> Result<ConfigRecord>;

    /// Insert `name` or replace its value in place, returning the row id.
    async fn upsert(&self, name: &str, value: &str) -> Result<RecordId>;

    /// Remove `name`, reporting whether a row existed.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Atomically add one to the decimal counter stored under `name` and return the new value.
    /// A missing counter starts at 1.
    async fn increment(&self, name: &str) -> Result<i64>;

    /// Load values for `names` keyed by record name.
    async fn load_by_names(&self, names: &[String]) -> Result<BTreeMap<String, String>> {
        let records = self.load_records(names).await?;
        Ok(records
            .into_iter()
            .map(|record| (record.name, record.value))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_accept_limits_and_reject_overflow() {
        let name = "n".repeat(MAX_NAME_BYTES);
        let value = "v".repeat(MAX_VALUE_BYTES);
        assert!(ensure_within_bounds(&name, &value).is_ok());

        let long_name = "n".repeat(MAX_NAME_BYTES + 1);
        let err = ensure_within_bounds(&long_name, "").unwrap_err();
        assert!(matches!(
            err,
            DataError::BoundExceeded { column: "name", .. }
        ));

        let long_value = "v".repeat(MAX_VALUE_BYTES + 1);
        let err = ensure_within_bounds("acl.allowlist.a", &long_value).unwrap_err();
        assert!(matches!(
            err,
            DataError::BoundExceeded {
                column: "value",
                actual,
                ..
            } if actual == MAX_VALUE_BYTES + 1
        ));
    }

    #[test]
    fn bounds_count_bytes_not_chars() {
        // 43 three-byte characters = 129 bytes.
        let name = "\u{20ac}".repeat(43);
        assert!(ensure_within_bounds(&name, "").is_err());
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(ensure_within_bounds("", "value").is_err());
    }

    #[test]
    fn counters_separate_garbage_from_overflow() {
        assert_eq!(parse_counter("reorg.version", " 41\n").ok(), Some(41));
        assert!(matches!(
            parse_counter("reorg.version", "forty"),
            Err(DataError::NonNumericCounter { .. })
        ));
        assert!(matches!(
            parse_counter("reorg.version", "99999999999999999999"),
            Err(DataError::CounterOverflow { .. })
        ));
        assert!(matches!(
            parse_counter("reorg.version", "-99999999999999999999"),
            Err(DataError::CounterOverflow { .. })
        ));
    }
}
