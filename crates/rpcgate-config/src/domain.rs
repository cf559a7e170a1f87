//! Typed configuration domains layered over flat records.
//!
//! # Design
//! - Every domain owns one reserved prefix; the logical name and record id stamp each object.
//! - Single-object decoding surfaces every failure. Batch decoding logs and skips rows that
//!   fail validation so one corrupt row never hides the rest of its domain.

use std::collections::BTreeMap;

use rpcgate_data::{ConfigRecord, RecordId};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{ConfigError, ConfigResult};
use crate::fingerprint::{Fingerprints, fingerprint};
use crate::namespace;

/// A configuration domain stored under a reserved record-name prefix.
pub trait ConfigDomain: Sized + Send + Sync {
    /// Reserved record-name prefix.
    const PREFIX: &'static str;
    /// Human-readable label used in errors and logs.
    const KIND: &'static str;

    /// Build the typed object from a record's id, logical name, and raw payload.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the payload is malformed or violates a domain rule.
    fn from_payload(id: RecordId, name: &str, value: &str) -> ConfigResult<Self>;

    /// Serialize the object's payload for storage.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the object violates a domain rule.
    fn to_payload(&self) -> ConfigResult<String>;

    /// Logical name (record name without the prefix).
    fn logical_name(&self) -> &str;

    /// Record id the object was loaded from; `0` for objects not yet stored.
    fn id(&self) -> RecordId;
}

/// Decode one record into `D`.
///
/// # Errors
///
/// Returns a validation error when the name lies outside `D`'s namespace, the logical name is
/// empty, or the payload is invalid.
pub fn decode_record<D: ConfigDomain>(record: &ConfigRecord) -> ConfigResult<D> {
    let name = namespace::decode(D::PREFIX, &record.name)?;
    D::from_payload(record.id, name, &record.value)
}

pub(crate) fn parse_json<T: DeserializeOwned>(
    domain: &'static str,
    name: &str,
    value: &str,
) -> ConfigResult<T> {
    serde_json::from_str(value).map_err(|source| ConfigError::MalformedPayload {
        domain,
        name: name.to_string(),
        source,
    })
}

pub(crate) fn render_json<T: Serialize>(
    domain: &'static str,
    name: &str,
    payload: &T,
) -> ConfigResult<String> {
    serde_json::to_string(payload)
        .map_err(|err| ConfigError::invalid(domain, name, format!("not serializable: {err}")))
}

fn log_skipped<D: ConfigDomain>(record: &ConfigRecord, err: &ConfigError) {
    warn!(
        domain = D::KIND,
        record_id = record.id,
        record_name = %record.name,
        error = %err,
        "skipping invalid config record"
    );
}

/// Every valid object of one domain with the fingerprints of their raw values.
#[derive(Debug, Clone)]
pub struct DomainSnapshot<D> {
    /// Decoded objects keyed by record id.
    pub items: BTreeMap<RecordId, D>,
    /// Fingerprints of the decoded rows, keyed by record id.
    pub fingerprints: Fingerprints,
}

impl<D> Default for DomainSnapshot<D> {
    fn default() -> Self {
        Self {
            items: BTreeMap::new(),
            fingerprints: Fingerprints::new(),
        }
    }
}

impl<D: ConfigDomain> DomainSnapshot<D> {
    /// Decode `records`, skipping rows that fail validation.
    #[must_use]
    pub fn decode(records: Vec<ConfigRecord>) -> Self {
        let mut snapshot = Self::default();
        for record in records {
            match decode_record::<D>(&record) {
                Ok(item) => {
                    snapshot
                        .fingerprints
                        .insert(record.id, fingerprint(&record.value));
                    snapshot.items.insert(record.id, item);
                }
                Err(err) => log_skipped::<D>(&record, &err),
            }
        }
        snapshot
    }

    /// Number of decoded objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no objects were decoded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Find an object by logical name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&D> {
        self.items.values().find(|item| item.logical_name() == name)
    }
}

/// Objects whose raw value changed relative to a caller's fingerprint snapshot.
#[derive(Debug, Clone)]
pub struct DomainDelta<D> {
    /// Newly added or modified objects keyed by record id.
    pub changed: BTreeMap<RecordId, D>,
    /// Ids from the previous snapshot that are gone or no longer decode.
    pub removed: Vec<RecordId>,
    /// Fingerprints of every currently valid row, for the caller's next poll.
    pub fingerprints: Fingerprints,
}

impl<D: ConfigDomain> DomainDelta<D> {
    /// Decode only the rows whose fingerprint differs from `previous`.
    ///
    /// Rows with an unchanged fingerprint are assumed still valid, since an identical value
    /// decoded successfully before.
    #[must_use]
    pub fn decode(records: Vec<ConfigRecord>, previous: &Fingerprints) -> Self {
        let mut changed = BTreeMap::new();
        let mut fingerprints = Fingerprints::new();
        for record in records {
            let digest = fingerprint(&record.value);
            if previous.get(&record.id) == Some(&digest) {
                fingerprints.insert(record.id, digest);
                continue;
            }
            match decode_record::<D>(&record) {
                Ok(item) => {
                    fingerprints.insert(record.id, digest);
                    changed.insert(record.id, item);
                }
                Err(err) => log_skipped::<D>(&record, &err),
            }
        }
        let removed = previous
            .keys()
            .filter(|id| !fingerprints.contains_key(*id))
            .copied()
            .collect();
        Self {
            changed,
            removed,
            fingerprints,
        }
    }

    /// Whether the caller's cached view is still current.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }
}
