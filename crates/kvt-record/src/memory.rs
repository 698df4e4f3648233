use std::collections::HashMap;
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use kvt_types::{Digest, StoreFeatures, StoreValue};
use tracing::trace;

use crate::error::{StoreError, StoreResult};
use crate::key::Key;
use crate::record::{Bin, Record, RecordMeta, WriteMeta};
use crate::store::RecordStore;

type RecordId = (String, Digest);

#[derive(Clone, Debug)]
struct StoredRecord {
    key: Key,
    meta: RecordMeta,
    bins: Vec<Bin>,
}

/// In-memory, HashMap-based record store.
///
/// Intended for tests and embedding. Records are keyed by namespace and
/// digest and held behind a `RwLock`. Writes merge bins, a `Nil` bin deletes
/// that bin, and a record left without bins is removed.
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<RecordId, StoredRecord>>,
    features: StoreFeatures,
}

impl InMemoryRecordStore {
    /// Create an empty store with every optional capability.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            features: StoreFeatures::full(),
        }
    }

    /// Report `features` instead of full capabilities.
    pub fn with_features(mut self, features: StoreFeatures) -> Self {
        self.features = features;
        self
    }

    fn read_lock(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<RecordId, StoredRecord>>> {
        self.records
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))
    }

    fn write_lock(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<RecordId, StoredRecord>>> {
        self.records
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.read_lock().map(|map| map.len()).unwrap_or(0)
    }

    /// Returns `true` if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all records.
    pub fn clear(&self) -> StoreResult<()> {
        self.write_lock()?.clear();
        Ok(())
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

fn record_id(key: &Key) -> RecordId {
    (key.namespace().to_string(), key.digest())
}

impl RecordStore for InMemoryRecordStore {
    fn features(&self) -> StoreFeatures {
        self.features
    }

    fn put(&self, key: &Key, record: &Record, meta: &WriteMeta) -> StoreResult<()> {
        let id = record_id(key);
        let mut map = self.write_lock()?;
        let current = map.get(&id).map(|r| r.meta.generation).unwrap_or(0);
        if !meta.generation.permits(current) {
            return Err(StoreError::GenerationMismatch {
                expected: meta.generation.to_string(),
                actual: current,
            });
        }

        let entry = map.entry(id.clone()).or_insert_with(|| StoredRecord {
            key: key.clone(),
            meta: RecordMeta::default(),
            bins: Vec::new(),
        });
        for bin in &record.bins {
            let existing = entry.bins.iter().position(|b| b.name == bin.name);
            match (existing, &bin.value) {
                (Some(i), StoreValue::Nil) => {
                    entry.bins.remove(i);
                }
                (Some(i), _) => entry.bins[i].value = bin.value.clone(),
                (None, StoreValue::Nil) => {}
                (None, _) => entry.bins.push(bin.clone()),
            }
        }
        if key.value().is_some() {
            entry.key = key.clone();
        }
        entry.meta.ttl = meta.ttl;
        entry.meta.generation = current.wrapping_add(1);
        trace!(key = %key, generation = entry.meta.generation, bins = entry.bins.len(), "record stored");

        if entry.bins.is_empty() {
            map.remove(&id);
        }
        Ok(())
    }

    fn get(&self, key: &Key, bins: Option<&[String]>) -> StoreResult<Record> {
        let map = self.read_lock()?;
        let stored = map.get(&record_id(key)).ok_or_else(|| StoreError::NotFound {
            namespace: key.namespace().to_string(),
            digest: key.digest(),
        })?;
        let bins = match bins {
            Some(names) => names
                .iter()
                .filter_map(|name| stored.bins.iter().find(|b| &b.name == name))
                .cloned()
                .collect(),
            None => stored.bins.clone(),
        };
        Ok(Record::new(stored.key.clone(), stored.meta, bins))
    }
}

impl fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryRecordStore")
            .field("record_count", &self.len())
            .field("features", &self.features)
            .finish()
    }
}
