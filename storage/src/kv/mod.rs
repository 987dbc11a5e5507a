// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

//! Persistent key-value store interfaces.
//!
//! The trie cache never talks to a particular database. It reads through a
//! [`KeyValueReader`] and writes through [`Batch`]es handed out by a
//! [`KeyValueStore`].

use std::fmt::Debug;

#[cfg(feature = "fjall")]
pub(super) mod fjall;
pub(super) mod memory;

/// The amount of data a batch should accumulate before it is written.
pub const IDEAL_BATCH_SIZE: usize = 100 * 1024;

/// Errors returned by a key-value store.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DiskError {
    /// The backend failed the operation
    #[error("key-value backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The store refused the operation
    #[error("key-value store error: {0}")]
    Other(String),
}

impl DiskError {
    /// Creates a [`DiskError::Other`] from a message.
    pub fn other(message: impl Into<String>) -> Self {
        DiskError::Other(message.into())
    }
}

/// A single buffered batch operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Store `value` under `key`
    Put {
        /// The key
        key: Box<[u8]>,
        /// The value
        value: Box<[u8]>,
    },
    /// Remove `key`
    Delete {
        /// The key
        key: Box<[u8]>,
    },
}

impl BatchOp {
    /// The number of bytes this operation contributes to a batch's value size.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            BatchOp::Put { key, value } => key.len().saturating_add(value.len()),
            BatchOp::Delete { key } => key.len(),
        }
    }

    /// Applies this operation to `writer`.
    ///
    /// # Errors
    ///
    /// Returns whatever error the writer returns.
    pub fn apply(&self, writer: &mut (impl KeyValueWriter + ?Sized)) -> Result<(), DiskError> {
        match self {
            BatchOp::Put { key, value } => writer.put(key, value),
            BatchOp::Delete { key } => writer.delete(key),
        }
    }
}

/// Read access to a key-value store.
pub trait KeyValueReader {
    /// Returns the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`DiskError`] if the backend fails.
    fn get(&self, key: &[u8]) -> Result<Option<Box<[u8]>>, DiskError>;

    /// Returns true if a value is stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`DiskError`] if the backend fails.
    fn has(&self, key: &[u8]) -> Result<bool, DiskError> {
        Ok(self.get(key)?.is_some())
    }
}

/// A sink for key-value mutations.
pub trait KeyValueWriter {
    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`DiskError`] if the write is refused.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), DiskError>;

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`DiskError`] if the delete is refused.
    fn delete(&mut self, key: &[u8]) -> Result<(), DiskError>;
}

/// A write-only buffer of mutations that is applied to the store in one go.
pub trait Batch: KeyValueWriter + Send {
    /// The number of bytes buffered so far.
    fn value_size(&self) -> usize;

    /// Applies the buffered mutations to the store. The buffer is kept until
    /// [`Batch::reset`] is called.
    ///
    /// # Errors
    ///
    /// Returns a [`DiskError`] if the store rejects the batch; in that case
    /// nothing from the batch is visible.
    fn write(&mut self) -> Result<(), DiskError>;

    /// Drops all buffered mutations.
    fn reset(&mut self);

    /// Feeds the buffered mutations, in the order they were added, to `writer`.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first error from `writer`.
    fn replay(&self, writer: &mut dyn KeyValueWriter) -> Result<(), DiskError>;
}

/// A persistent key-value store.
pub trait KeyValueStore: KeyValueReader + Send + Sync + Debug {
    /// The batch type handed out by [`KeyValueStore::new_batch`]
    type Batch: Batch;

    /// Stores `value` under `key` immediately.
    ///
    /// # Errors
    ///
    /// Returns a [`DiskError`] if the backend fails.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), DiskError>;

    /// Removes `key` immediately.
    ///
    /// # Errors
    ///
    /// Returns a [`DiskError`] if the backend fails.
    fn delete(&self, key: &[u8]) -> Result<(), DiskError>;

    /// Creates an empty batch bound to this store.
    fn new_batch(&self) -> Self::Batch;
}

/// An in-order buffer of [`BatchOp`]s shared by the batch implementations.
#[derive(Debug, Default, Clone)]
pub(crate) struct OpLog {
    ops: Vec<BatchOp>,
    size: usize,
}

impl OpLog {
    pub(crate) fn push(&mut self, op: BatchOp) {
        self.size = self.size.saturating_add(op.size());
        self.ops.push(op);
    }

    pub(crate) const fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub(crate) fn clear(&mut self) {
        self.ops.clear();
        self.size = 0;
    }

    pub(crate) fn replay(&self, writer: &mut dyn KeyValueWriter) -> Result<(), DiskError> {
        self.ops.iter().try_for_each(|op| op.apply(writer))
    }

    pub(crate) fn record_write(&self) {
        metrics::counter!(crate::registry::BATCH_WRITE).increment(1);
        metrics::counter!(crate::registry::BATCH_OPS).increment(self.ops.len() as u64);
        metrics::counter!(crate::registry::BATCH_BYTES).increment(self.size as u64);
    }
}

impl KeyValueWriter for OpLog {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), DiskError> {
        self.push(BatchOp::Put {
            key: key.into(),
            value: value.into(),
        });
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), DiskError> {
        self.push(BatchOp::Delete { key: key.into() });
        Ok(())
    }
}
