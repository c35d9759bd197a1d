//! Updatable record store
//!
//! A [`Database`] is immutable. The store keeps the raw records of a
//! fixed-capacity database, rebuilds a new [`Database`] on every write and
//! swaps it in atomically. Requests load one snapshot and evaluate against it
//! from start to finish, so a concurrent write never mixes two versions.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use arc_swap::ArcSwap;
use dpf_pir_core::{Database, DatabaseBuilder};

use crate::error::{Result, ServerError};
use crate::metrics;

struct StoreInner {
    capacity: usize,
    records: Mutex<Vec<Vec<u8>>>,
    current: ArcSwap<Database>,
}

/// Shared handle to a fixed-capacity, rewritable set of records
///
/// Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct RecordStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}

fn rebuild(records: &[Vec<u8>]) -> Result<Database> {
    let mut builder = DatabaseBuilder::new().with_expected_size(records.len());
    for record in records {
        builder.insert(record.clone());
    }
    Ok(builder.build()?)
}

impl RecordStore {
    /// Store of `capacity` empty records
    pub fn new(capacity: usize) -> Result<Self> {
        Self::from_records(vec![Vec::new(); capacity])
    }

    /// Store whose capacity is the number of initial records
    pub fn from_records(records: Vec<Vec<u8>>) -> Result<Self> {
        let database = rebuild(&records)?;
        Ok(Self {
            inner: Arc::new(StoreInner {
                capacity: records.len(),
                records: Mutex::new(records),
                current: ArcSwap::from_pointee(database),
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Current database version
    pub fn snapshot(&self) -> Arc<Database> {
        self.inner.current.load_full()
    }

    /// Overwrite one record
    pub fn write(&self, index: usize, record: impl Into<Vec<u8>>) -> Result<()> {
        self.batch_write([(index, record.into())])
    }

    /// Overwrite several records with a single rebuild
    ///
    /// Every index is checked before anything is written.
    pub fn batch_write(&self, updates: impl IntoIterator<Item = (usize, Vec<u8>)>) -> Result<()> {
        let updates: Vec<(usize, Vec<u8>)> = updates.into_iter().collect();
        if let Some(&(index, _)) = updates.iter().find(|(i, _)| *i >= self.inner.capacity) {
            return Err(ServerError::IndexOutOfBounds {
                index,
                capacity: self.inner.capacity,
            });
        }

        let started = Instant::now();
        let mut records = self
            .inner
            .records
            .lock()
            .map_err(|_| ServerError::Internal("record store lock poisoned".to_string()))?;

        let mut staged = records.clone();
        for (index, record) in &updates {
            staged[*index] = record.clone();
        }
        let database = rebuild(&staged)?;
        *records = staged;
        self.inner.current.store(Arc::new(database));

        tracing::info!(
            records_written = updates.len(),
            capacity = self.inner.capacity,
            "Record store rebuilt"
        );
        metrics::record_store_rebuild(updates.len(), started.elapsed());

        Ok(())
    }
}
