// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::{Batch, BatchOp, DiskError, KeyValueReader, KeyValueStore, KeyValueWriter, OpLog};
use crate::registry;

type Table = HashMap<Box<[u8]>, Box<[u8]>>;

/// An in-memory key-value store.
///
/// Clones share the same underlying table, so a test can keep a handle to
/// the store it gave away.
#[derive(Debug, Default, Clone)]
pub struct MemoryDb {
    table: Arc<RwLock<Table>>,
}

impl MemoryDb {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of keys stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }
}

impl KeyValueReader for MemoryDb {
    fn get(&self, key: &[u8]) -> Result<Option<Box<[u8]>>, DiskError> {
        metrics::counter!(registry::KV_READ).increment(1);
        let value = self.table.read().get(key).cloned();
        if value.is_none() {
            metrics::counter!(registry::KV_READ_MISS).increment(1);
        }
        Ok(value)
    }

    fn has(&self, key: &[u8]) -> Result<bool, DiskError> {
        Ok(self.table.read().contains_key(key))
    }
}

impl KeyValueStore for MemoryDb {
    type Batch = MemoryBatch;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), DiskError> {
        self.table.write().insert(key.into(), value.into());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), DiskError> {
        self.table.write().remove(key);
        Ok(())
    }

    fn new_batch(&self) -> MemoryBatch {
        MemoryBatch {
            table: Arc::clone(&self.table),
            log: OpLog::default(),
        }
    }
}

/// A batch for [`MemoryDb`]. Writes are applied atomically under the table lock.
#[derive(Debug)]
pub struct MemoryBatch {
    table: Arc<RwLock<Table>>,
    log: OpLog,
}

impl KeyValueWriter for MemoryBatch {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), DiskError> {
        self.log.put(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), DiskError> {
        self.log.delete(key)
    }
}

impl Batch for MemoryBatch {
    fn value_size(&self) -> usize {
        self.log.size()
    }

    fn write(&mut self) -> Result<(), DiskError> {
        let mut table = self.table.write();
        for op in self.log.ops() {
            match op {
                BatchOp::Put { key, value } => {
                    table.insert(key.clone(), value.clone());
                }
                BatchOp::Delete { key } => {
                    table.remove(key);
                }
            }
        }
        drop(table);
        self.log.record_write();
        Ok(())
    }

    fn reset(&mut self) {
        self.log.clear();
    }

    fn replay(&self, writer: &mut dyn KeyValueWriter) -> Result<(), DiskError> {
        self.log.replay(writer)
    }
}
