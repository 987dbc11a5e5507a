// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

use parking_lot::RwLockUpgradableReadGuard;
use std::time::Instant;

use triedb_storage::logger::{debug, error};
use triedb_storage::{Batch, HASH_LENGTH, IDEAL_BATCH_SIZE, KeyValueStore, schema};

use crate::cached::CACHED_NODE_SIZE;
use crate::{Database, Error, registry};

impl<S: KeyValueStore> Database<S> {
    /// Flushes the oldest dirty nodes to disk until the memory reported by
    /// [`Database::size`] is at most `limit` bytes.
    ///
    /// Nodes are written regardless of whether anything still references
    /// them; they stay readable through the disk. Recorded preimages are
    /// written too once they outgrow the configured threshold.
    ///
    /// Nodes are only evicted after every write succeeded, and readers are not
    /// blocked while the writes are in progress.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disk`] if a batch write fails. Nothing is evicted in
    /// that case.
    pub fn cap(&self, limit: usize) -> Result<(), Error> {
        let start = Instant::now();
        let state = self.dirty.upgradable_read();
        let (nodes, storage) = (state.nodes.len(), state.dirties_size);
        let mut batch = self.disk.new_batch();
        let mut size = state.memory_size();

        // small preimage sets are kept to deduplicate writes
        let flush_preimages = state.preimages_size > self.config.preimage_flush_threshold;
        if flush_preimages && let Some(preimages) = &state.preimages {
            schema::write_preimages(&mut batch, preimages)?;
            if batch.value_size() > IDEAL_BATCH_SIZE {
                batch.write()?;
                batch.reset();
            }
        }

        let mut oldest = state.flush.oldest;
        while size > limit {
            let Some(hash) = oldest else {
                break;
            };
            let Some(node) = state.nodes.get(&hash) else {
                break;
            };
            schema::write_trie_node(&mut batch, &hash, &node.encoded())?;
            if batch.value_size() >= IDEAL_BATCH_SIZE {
                if let Err(err) = batch.write() {
                    error!("failed to write flush list to disk: {err}");
                    return Err(err.into());
                }
                batch.reset();
            }
            let flushed = HASH_LENGTH
                .saturating_add(node.size)
                .saturating_add(CACHED_NODE_SIZE)
                .saturating_add(node.children_size());
            size = size.saturating_sub(flushed);
            oldest = node.flush_next;
        }
        if let Err(err) = batch.write() {
            error!("failed to write flush list to disk: {err}");
            return Err(err.into());
        }

        // everything is on disk, evict it
        let mut guard = RwLockUpgradableReadGuard::upgrade(state);
        let state = &mut *guard;
        if flush_preimages && let Some(preimages) = &mut state.preimages {
            preimages.clear();
            state.preimages_size = 0;
        }
        let mut cursor = state.flush.oldest;
        while cursor != oldest {
            let Some(hash) = cursor else {
                break;
            };
            cursor = state.remove_node(&hash).and_then(|node| node.flush_next);
        }
        state.flush.truncate_front(&mut state.nodes, oldest);

        let flushed_nodes = nodes.saturating_sub(state.nodes.len()) as u64;
        let flushed_size = storage.saturating_sub(state.dirties_size);
        let elapsed = start.elapsed();
        let stats = &mut state.stats;
        stats.flush_nodes = stats.flush_nodes.saturating_add(flushed_nodes);
        stats.flush_size = stats.flush_size.saturating_add(flushed_size);
        stats.flush_time = stats.flush_time.saturating_add(elapsed);

        metrics::counter!(registry::FLUSH_NODES).increment(flushed_nodes);
        metrics::counter!(registry::FLUSH_SIZE).increment(flushed_size as u64);
        metrics::histogram!(registry::FLUSH_TIME).record(elapsed.as_secs_f64());

        debug!(
            "persisted nodes from memory database: nodes {flushed_nodes}, size {flushed_size}, time {elapsed:?}, flushnodes {}, flushsize {}, flushtime {:?}, livenodes {}, livesize {}",
            stats.flush_nodes,
            stats.flush_size,
            stats.flush_time,
            state.nodes.len().saturating_sub(1),
            state.dirties_size
        );
        Ok(())
    }
}
