//! In-process record repository with the same semantics as the PostgreSQL store.
//!
//! Used by unit tests across the workspace and by consumers that want a store without a
//! database. Ids are allocated from a monotonic sequence and never reused.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{DataError, RecordLookup, Result};
use crate::record::{
    ConfigRecord, RecordId, RecordRepository, ensure_within_bounds, parse_counter,
};

#[derive(Debug, Default)]
struct MemoryState {
    next_id: RecordId,
    rows: BTreeMap<String, ConfigRecord>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> RecordId {
        self.next_id += 1;
        self.next_id
    }

    fn sorted_by_id<'a>(rows: impl Iterator<Item = &'a ConfigRecord>) -> Vec<ConfigRecord> {
        let mut records: Vec<ConfigRecord> = rows.cloned().collect();
        records.sort_by_key(|record| record.id);
        records
    }
}

/// Repository that keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    state: Mutex<MemoryState>,
}

impl MemoryRecordStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().rows.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RecordRepository for MemoryRecordStore {
    async fn load_records(&self, names: &[String]) -> Result<Vec<ConfigRecord>> {
        let state = self.lock();
        Ok(MemoryState::sorted_by_id(
            names.iter().filter_map(|name| state.rows.get(name)),
        ))
    }

    async fn load_by_name(&self, name: &str) -> Result<Option<ConfigRecord>> {
        Ok(self.lock().rows.get(name).cloned())
    }

    async fn load_by_prefix(&self, prefix: &str) -> Result<Vec<ConfigRecord>> {
        let state = self.lock();
        Ok(MemoryState::sorted_by_id(
            state
                .rows
                .range(prefix.to_string()..)
                .take_while(|(name, _)| name.starts_with(prefix))
                .map(|(_, record)| record),
        ))
    }

    async fn load_by_id(&self, id: RecordId) -> Result<ConfigRecord> {
        self.lock()
            .rows
            .values()
            .find(|record| record.id == id)
            .cloned()
            .ok_or(DataError::RecordNotFound {
                lookup: RecordLookup::Id(id),
            })
    }

    async fn upsert(&self, name: &str, value: &str) -> Result<RecordId> {
        ensure_within_bounds(name, value)?;
        let mut state = self.lock();
        let now = Utc::now();
        if let Some(existing) = state.rows.get_mut(name) {
            if existing.value != value {
                existing.value = value.to_string();
                existing.updated_at = now;
            }
            return Ok(existing.id);
        }
        let id = state.allocate_id();
        state.rows.insert(
            name.to_string(),
            ConfigRecord {
                id,
                name: name.to_string(),
                value: value.to_string(),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.lock().rows.remove(name).is_some())
    }

    async fn increment(&self, name: &str) -> Result<i64> {
        ensure_within_bounds(name, "")?;
        let mut state = self.lock();
        let now = Utc::now();
        if let Some(existing) = state.rows.get_mut(name) {
            let next = parse_counter(name, &existing.value)?
                .checked_add(1)
                .ok_or_else(|| DataError::CounterOverflow {
                    name: name.to_string(),
                })?;
            existing.value = next.to_string();
            existing.updated_at = now;
            return Ok(next);
        }
        let id = state.allocate_id();
        state.rows.insert(
            name.to_string(),
            ConfigRecord {
                id,
                name: name.to_string(),
                value: "1".to_string(),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(1)
    }
}
