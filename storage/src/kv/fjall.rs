// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::fmt::{self, Debug, Formatter};
use std::path::Path;

use super::{Batch, BatchOp, DiskError, KeyValueReader, KeyValueStore, KeyValueWriter, OpLog};
use crate::registry;

const FJALL_PARTITION_NAME: &str = "trie";

impl From<fjall::Error> for DiskError {
    fn from(error: fjall::Error) -> Self {
        DiskError::Backend(Box::new(error))
    }
}

/// A key-value store kept in a single fjall partition.
#[derive(Clone)]
pub struct FjallDb {
    keyspace: Keyspace,
    items: PartitionHandle,
}

impl Debug for FjallDb {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FjallDb").finish_non_exhaustive()
    }
}

impl FjallDb {
    /// Creates or opens a store in the directory `path`.
    ///
    /// If `truncate` is set, any existing contents are discarded.
    ///
    /// # Errors
    ///
    /// Returns a [`DiskError`] if the keyspace or partition cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, truncate: bool) -> Result<Self, DiskError> {
        let keyspace = Config::new(path).open()?;

        if truncate {
            let items =
                keyspace.open_partition(FJALL_PARTITION_NAME, PartitionCreateOptions::default())?;
            keyspace.delete_partition(items)?;
        }

        let items =
            keyspace.open_partition(FJALL_PARTITION_NAME, PartitionCreateOptions::default())?;
        Ok(Self { keyspace, items })
    }
}

impl KeyValueReader for FjallDb {
    fn get(&self, key: &[u8]) -> Result<Option<Box<[u8]>>, DiskError> {
        metrics::counter!(registry::KV_READ).increment(1);
        let value = self.items.get(key)?.map(|v| Box::from(v.as_ref()));
        if value.is_none() {
            metrics::counter!(registry::KV_READ_MISS).increment(1);
        }
        Ok(value)
    }
}

impl KeyValueStore for FjallDb {
    type Batch = FjallBatch;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), DiskError> {
        self.items.insert(key, value)?;
        self.keyspace.persist(PersistMode::Buffer)?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), DiskError> {
        self.items.remove(key)?;
        self.keyspace.persist(PersistMode::Buffer)?;
        Ok(())
    }

    fn new_batch(&self) -> FjallBatch {
        FjallBatch {
            db: self.clone(),
            log: OpLog::default(),
        }
    }
}

/// A batch for [`FjallDb`], committed as one fjall write batch.
#[derive(Debug)]
pub struct FjallBatch {
    db: FjallDb,
    log: OpLog,
}

impl KeyValueWriter for FjallBatch {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), DiskError> {
        self.log.put(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), DiskError> {
        self.log.delete(key)
    }
}

impl Batch for FjallBatch {
    fn value_size(&self) -> usize {
        self.log.size()
    }

    fn write(&mut self) -> Result<(), DiskError> {
        let mut batch = self.db.keyspace.batch();
        for op in self.log.ops() {
            match op {
                BatchOp::Put { key, value } => batch.insert(&self.db.items, &**key, &**value),
                BatchOp::Delete { key } => batch.remove(&self.db.items, &**key),
            }
        }
        batch.commit()?;
        self.db.keyspace.persist(PersistMode::Buffer)?;
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
