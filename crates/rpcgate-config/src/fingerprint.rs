//! Change-detection digests over raw record values.
//!
//! Fingerprints gate re-parsing for polling consumers. They are recomputed on every read
//! and never stored or used for authorization.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use rpcgate_data::RecordId;
use serde::{Serialize, Serializer};

/// Digest length in bytes.
pub const FINGERPRINT_LEN: usize = blake3::OUT_LEN;

/// Fixed-size digest of a record value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Digest `value`.
    #[must_use]
    pub fn of(value: &[u8]) -> Self {
        Self(*blake3::hash(value).as_bytes())
    }

    /// Raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    /// Lowercase hex rendering.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Display for Fingerprint {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.to_hex())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Digest `value`.
#[must_use]
pub fn fingerprint(value: impl AsRef<[u8]>) -> Fingerprint {
    Fingerprint::of(value.as_ref())
}

/// Fingerprints keyed by record id, as returned by bulk loaders.
pub type Fingerprints = BTreeMap<RecordId, Fingerprint>;

/// Classification of record ids between two fingerprint snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintDiff {
    /// Ids present only in the current snapshot.
    pub added: Vec<RecordId>,
    /// Ids present in both with differing digests.
    pub changed: Vec<RecordId>,
    /// Ids present only in the previous snapshot.
    pub removed: Vec<RecordId>,
    /// Ids present in both with identical digests.
    pub unchanged: Vec<RecordId>,
}

impl FingerprintDiff {
    /// Compare `previous` against `current`. Output vectors are sorted by id.
    #[must_use]
    pub fn between(previous: &Fingerprints, current: &Fingerprints) -> Self {
        let mut diff = Self::default();
        for (id, digest) in current {
            match previous.get(id) {
                None => diff.added.push(*id),
                Some(prior) if prior == digest => diff.unchanged.push(*id),
                Some(_) => diff.changed.push(*id),
            }
        }
        diff.removed = previous
            .keys()
            .filter(|id| !current.contains_key(*id))
            .copied()
            .collect();
        diff
    }

    /// Whether anything was added, changed, or removed.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !(self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty())
    }
}
