// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

//! Committing a trie to disk.
//!
//! Nodes are written in post-order so a child always reaches the disk before
//! its parent. Whenever a batch is written, its puts are replayed through a
//! [`Cleaner`] which uncaches the written nodes and promotes them into the
//! clean cache. Nodes of a batch that fails to write are never uncached.
//!
//! The walk and the disk writes only hold an upgradable read lock, so readers
//! keep being served while batches are written. The lock is upgraded for the
//! replay of each written batch.

use std::collections::HashSet;
use std::time::Instant;

use parking_lot::RwLockUpgradableReadGuard;
use triedb_storage::logger::{debug, error, info};
use triedb_storage::{
    Batch, DiskError, IDEAL_BATCH_SIZE, KeyValueStore, KeyValueWriter, TrieHash, schema,
};

use crate::cleans::CleanCache;
use crate::database::{DirtyState, Stats};
use crate::{Database, Error, registry};

struct Committer<'a, B> {
    state: RwLockUpgradableReadGuard<'a, DirtyState>,
    batch: &'a mut B,
    cleans: Option<&'a CleanCache>,
    uncache: bool,
    visited: HashSet<TrieHash>,
}

impl<B: Batch> Committer<'_, B> {
    fn commit(&mut self, hash: &TrieHash) -> Result<(), Error> {
        // anything not fresh was committed before
        if !self.state.fresh.contains(hash) || !self.visited.insert(*hash) {
            return Ok(());
        }
        let Some(node) = self.state.nodes.get(hash) else {
            return Ok(());
        };
        for child in &node.child_list() {
            self.commit(child)?;
        }
        let Some(node) = self.state.nodes.get(hash) else {
            return Ok(());
        };
        schema::write_trie_node(&mut *self.batch, hash, &node.encoded())?;
        if self.batch.value_size() >= IDEAL_BATCH_SIZE {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.batch.write()?;
        let (batch, cleans, uncache) = (&*self.batch, self.cleans, self.uncache);
        RwLockUpgradableReadGuard::with_upgraded(&mut self.state, |state| {
            batch.replay(&mut Cleaner {
                state,
                cleans,
                uncache,
            })
        })?;
        self.batch.reset();
        Ok(())
    }
}

/// Reacts to the puts of a written commit batch.
struct Cleaner<'a> {
    state: &'a mut DirtyState,
    cleans: Option<&'a CleanCache>,
    uncache: bool,
}

impl KeyValueWriter for Cleaner<'_> {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), DiskError> {
        let hash = TrieHash::try_from(key).map_err(|err| DiskError::other(err.to_string()))?;
        if self.uncache {
            if !self.state.nodes.contains_key(&hash) {
                return Ok(());
            }
            self.state.flush.unlink(&mut self.state.nodes, &hash);
            self.state.remove_node(&hash);
            self.state.forget_root(&hash);
        }
        if let Some(cleans) = self.cleans {
            cleans.set(hash, value);
            metrics::counter!(registry::CLEAN_WRITE).increment(value.len() as u64);
        }
        Ok(())
    }

    fn delete(&mut self, _key: &[u8]) -> Result<(), DiskError> {
        Err(DiskError::other("commit batches never delete"))
    }
}

impl<S: KeyValueStore> Database<S> {
    /// Writes every fresh node reachable from `root` to disk, along with all
    /// recorded preimages.
    ///
    /// With `uncache` the written nodes leave the dirty set and are served
    /// from the clean cache or disk afterwards; without it they stay cached
    /// and are merely no longer fresh. `report` logs the outcome at info
    /// instead of debug level. The garbage collection and flush statistics
    /// are reset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disk`] if a batch write fails. Nodes written by
    /// earlier batches of the same commit are uncached, the rest stay fresh
    /// and cached so the commit can be retried.
    pub fn commit(&self, root: &TrieHash, report: bool, uncache: bool) -> Result<(), Error> {
        let start = Instant::now();
        let state = self.dirty.upgradable_read();
        let mut batch = self.disk.new_batch();

        // preimages go first so the node batches replay only nodes
        if let Some(preimages) = &state.preimages {
            schema::write_preimages(&mut batch, preimages)?;
            batch.write()?;
            batch.reset();
        }

        let (nodes, storage) = (state.nodes.len(), state.dirties_size);
        let mut committer = Committer {
            state,
            batch: &mut batch,
            cleans: self.cleans.as_ref(),
            uncache,
            visited: HashSet::new(),
        };
        if let Err(err) = committer.commit(root).and_then(|()| committer.flush()) {
            error!("failed to commit trie {root} from trie database: {err}");
            return Err(err);
        }

        let mut guard = RwLockUpgradableReadGuard::upgrade(committer.state);
        let state = &mut *guard;
        if let Some(preimages) = &mut state.preimages {
            preimages.clear();
            state.preimages_size = 0;
        }
        state.fresh.clear();

        let committed_nodes = nodes.saturating_sub(state.nodes.len());
        let committed_size = storage.saturating_sub(state.dirties_size);
        let elapsed = start.elapsed();
        metrics::counter!(registry::COMMIT_NODES).increment(committed_nodes as u64);
        metrics::counter!(registry::COMMIT_SIZE).increment(committed_size as u64);
        metrics::histogram!(registry::COMMIT_TIME).record(elapsed.as_secs_f64());

        let stats = state.stats;
        let nodes = (committed_nodes as u64).saturating_add(stats.flush_nodes);
        let size = committed_size.saturating_add(stats.flush_size);
        let time = elapsed.saturating_add(stats.flush_time);
        let livenodes = state.nodes.len().saturating_sub(1);
        let livesize = state.dirties_size;
        if report {
            info!(
                "persisted trie {root} from memory database: nodes {nodes}, size {size}, time {time:?}, gcnodes {}, gcsize {}, gctime {:?}, livenodes {livenodes}, livesize {livesize}",
                stats.gc_nodes, stats.gc_size, stats.gc_time
            );
        } else {
            debug!(
                "persisted trie {root} from memory database: nodes {nodes}, size {size}, time {time:?}, gcnodes {}, gcsize {}, gctime {:?}, livenodes {livenodes}, livesize {livesize}",
                stats.gc_nodes, stats.gc_size, stats.gc_time
            );
        }

        state.stats = Stats::default();
        Ok(())
    }
}
