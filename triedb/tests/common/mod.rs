// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use triedb::{Database, TrieHash};
use triedb_storage::{
    Batch, DiskError, KeyValueReader, KeyValueStore, KeyValueWriter, MemoryBatch, MemoryDb, Node,
    Path,
};

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
    triedb::registry::register();
}

pub fn leaf(tag: u8, len: usize) -> Node {
    Node::leaf(Path::from_key_bytes(&[tag; 32]), vec![tag; len])
}

/// Inserts one leaf per tag and a branch over them, and anchors the branch
/// under the meta-root. Returns the branch hash and the leaf hashes.
pub fn build<S: KeyValueStore>(
    db: &Database<S>,
    tags: impl IntoIterator<Item = u8>,
    len: usize,
) -> (TrieHash, Vec<TrieHash>) {
    let leaves: Vec<TrieHash> = tags
        .into_iter()
        .map(|tag| db.insert_node(leaf(tag, len)))
        .collect();
    let branch = Node::branch(
        leaves
            .iter()
            .zip(0u8..)
            .map(|(hash, nibble)| (nibble, Node::Hash(*hash))),
        None,
    );
    let root = db.insert_node(branch);
    db.reference(&root, &TrieHash::ZERO);
    (root, leaves)
}

/// A [`MemoryDb`] whose batches fail once a number of writes succeeded.
#[derive(Debug, Clone)]
pub struct FailingDb {
    inner: MemoryDb,
    writes_left: Arc<AtomicUsize>,
}

impl FailingDb {
    pub fn new(writes: usize) -> Self {
        Self {
            inner: MemoryDb::new(),
            writes_left: Arc::new(AtomicUsize::new(writes)),
        }
    }

    /// Lets the next `writes` batch writes succeed.
    pub fn allow(&self, writes: usize) {
        self.writes_left.store(writes, Ordering::SeqCst);
    }

    pub const fn inner(&self) -> &MemoryDb {
        &self.inner
    }
}

impl KeyValueReader for FailingDb {
    fn get(&self, key: &[u8]) -> Result<Option<Box<[u8]>>, DiskError> {
        self.inner.get(key)
    }
}

impl KeyValueStore for FailingDb {
    type Batch = FailingBatch;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), DiskError> {
        self.inner.put(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<(), DiskError> {
        KeyValueStore::delete(&self.inner, key)
    }

    fn new_batch(&self) -> FailingBatch {
        FailingBatch {
            inner: self.inner.new_batch(),
            writes_left: Arc::clone(&self.writes_left),
        }
    }
}

#[derive(Debug)]
pub struct FailingBatch {
    inner: MemoryBatch,
    writes_left: Arc<AtomicUsize>,
}

impl KeyValueWriter for FailingBatch {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), DiskError> {
        self.inner.put(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), DiskError> {
        self.inner.delete(key)
    }
}

impl Batch for FailingBatch {
    fn value_size(&self) -> usize {
        self.inner.value_size()
    }

    fn write(&mut self) -> Result<(), DiskError> {
        self.writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .map_err(|_| DiskError::other("injected write failure"))?;
        self.inner.write()
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn replay(&self, writer: &mut dyn KeyValueWriter) -> Result<(), DiskError> {
        self.inner.replay(writer)
    }
}

/// A [`MemoryDb`] whose batch writes take at least `delay`.
#[derive(Debug, Clone)]
pub struct SlowDb {
    inner: MemoryDb,
    delay: Duration,
}

impl SlowDb {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryDb::new(),
            delay,
        }
    }

    pub const fn inner(&self) -> &MemoryDb {
        &self.inner
    }
}

impl KeyValueReader for SlowDb {
    fn get(&self, key: &[u8]) -> Result<Option<Box<[u8]>>, DiskError> {
        self.inner.get(key)
    }
}

impl KeyValueStore for SlowDb {
    type Batch = SlowBatch;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), DiskError> {
        self.inner.put(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<(), DiskError> {
        KeyValueStore::delete(&self.inner, key)
    }

    fn new_batch(&self) -> SlowBatch {
        SlowBatch {
            inner: self.inner.new_batch(),
            delay: self.delay,
        }
    }
}

#[derive(Debug)]
pub struct SlowBatch {
    inner: MemoryBatch,
    delay: Duration,
}

impl KeyValueWriter for SlowBatch {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), DiskError> {
        self.inner.put(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), DiskError> {
        self.inner.delete(key)
    }
}

impl Batch for SlowBatch {
    fn value_size(&self) -> usize {
        self.inner.value_size()
    }

    fn write(&mut self) -> Result<(), DiskError> {
        thread::sleep(self.delay);
        self.inner.write()
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn replay(&self, writer: &mut dyn KeyValueWriter) -> Result<(), DiskError> {
        self.inner.replay(writer)
    }
}
