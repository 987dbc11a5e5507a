// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

//! Version based garbage collection of dirty nodes.
//!
//! Dereferencing walks down from a root and drops every cached node whose
//! version is older than the database's, without touching the disk. Nodes
//! that may already have been flushed are remembered in "useless" sets so a
//! later [`Database::useless_gc`] can delete them from disk in batches.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use triedb_storage::logger::{debug, error, warn};
use triedb_storage::{Batch, IDEAL_BATCH_SIZE, KeyValueStore, TrieHash, schema};

use crate::cached::CHILD_EDGE_SIZE;
use crate::cleans::CleanCache;
use crate::database::DirtyState;
use crate::{Database, Error, registry};

/// State of one dereference walk. `elapsed` reports the time spent so far
/// and is polled once per visited node.
struct Sweep<'a, C> {
    elapsed: C,
    limit: Duration,
    cleans: Option<&'a CleanCache>,
    useless: Option<&'a mut HashSet<TrieHash>>,
    interrupted: bool,
}

impl<C: FnMut() -> Duration> Sweep<'_, C> {
    fn over_budget(&mut self) -> bool {
        if !self.interrupted {
            let elapsed = (self.elapsed)();
            if elapsed >= self.limit {
                warn!("dereference overtime, interrupting after {elapsed:?}");
                self.interrupted = true;
            }
        }
        self.interrupted
    }

    /// Called for every removed trie node; raw blobs are never passed here.
    fn clear(&mut self, hash: &TrieHash) {
        if let Some(useless) = self.useless.as_deref_mut() {
            useless.insert(*hash);
        }
        if let Some(cleans) = self.cleans {
            cleans.remove(hash);
        }
    }
}

impl DirtyState {
    fn dereference<C>(&mut self, hash: &TrieHash, sweep: &mut Sweep<'_, C>)
    where
        C: FnMut() -> Duration,
    {
        // new nodes are still being built on
        if hash.is_zero() || self.fresh.contains(hash) {
            return;
        }
        // already flushed or committed
        let Some(node) = self.nodes.get(hash) else {
            return;
        };
        if sweep.over_budget() || node.version >= self.version {
            return;
        }
        let children = node.child_list();

        self.flush.unlink(&mut self.nodes, hash);
        for child in &children {
            self.dereference(child, sweep);
        }
        if let Some(node) = self.remove_node(hash)
            && !node.is_raw()
        {
            sweep.clear(hash);
        }
    }

    /// Drops the meta-root edge of a root that is no longer cached.
    pub(crate) fn forget_root(&mut self, root: &TrieHash) {
        if self.nodes.contains_key(root) {
            return;
        }
        let removed = self
            .nodes
            .get_mut(&TrieHash::ZERO)
            .and_then(|meta| meta.children.as_mut())
            .and_then(|children| children.remove(root));
        if removed.is_some() {
            self.children_size = self.children_size.saturating_sub(CHILD_EDGE_SIZE);
        }
    }
}

impl<S: KeyValueStore> Database<S> {
    /// Drops every stale node reachable from `root`.
    ///
    /// A node is stale if its version is older than the current one; fresh
    /// nodes, current nodes and anything below them are left alone. The walk
    /// stops early, keeping what it removed so far, if it runs past the
    /// configured time limit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MetaRoot`] if `root` is the zero hash.
    pub fn dereference(&self, root: &TrieHash) -> Result<(), Error> {
        self.dereference_inner(root, None)
    }

    /// Like [`Database::dereference`], but also queues the dropped hashes for
    /// deletion from disk by [`Database::useless_gc`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::MetaRoot`] if `root` is the zero hash.
    pub fn dereference_db(&self, root: &TrieHash) -> Result<(), Error> {
        let mut useless = HashSet::new();
        self.dereference_inner(root, Some(&mut useless))?;
        self.dirty.write().useless.push_back(useless);
        Ok(())
    }

    fn dereference_inner(
        &self,
        root: &TrieHash,
        useless: Option<&mut HashSet<TrieHash>>,
    ) -> Result<(), Error> {
        if root.is_zero() {
            error!("attempted to dereference the trie cache meta-root");
            return Err(Error::MetaRoot);
        }
        let start = Instant::now();
        let mut guard = self.dirty.write();
        let state = &mut *guard;
        let (nodes, storage) = (state.nodes.len(), state.dirties_size);

        let mut sweep = Sweep {
            elapsed: || start.elapsed(),
            limit: self.config.dereference_time_limit,
            cleans: self.cleans.as_ref(),
            useless,
            interrupted: false,
        };
        state.dereference(root, &mut sweep);
        state.forget_root(root);

        let removed_nodes = nodes.saturating_sub(state.nodes.len()) as u64;
        let removed_size = storage.saturating_sub(state.dirties_size);
        let elapsed = start.elapsed();
        let stats = &mut state.stats;
        stats.gc_nodes = stats.gc_nodes.saturating_add(removed_nodes);
        stats.gc_size = stats.gc_size.saturating_add(removed_size);
        stats.gc_time = stats.gc_time.saturating_add(elapsed);

        metrics::counter!(registry::GC_NODES).increment(removed_nodes);
        metrics::counter!(registry::GC_SIZE).increment(removed_size as u64);
        metrics::histogram!(registry::GC_TIME).record(elapsed.as_secs_f64());

        debug!(
            "dereferenced trie {root} from memory database: nodes {removed_nodes}, size {removed_size}, time {elapsed:?}, gcnodes {}, gcsize {}, gctime {:?}, livenodes {}, livesize {}",
            stats.gc_nodes,
            stats.gc_size,
            stats.gc_time,
            state.nodes.len().saturating_sub(1),
            state.dirties_size
        );
        Ok(())
    }

    /// Deletes from disk the nodes of up to `num` queued useless sets, skipping
    /// any hash that has been cached again since it was dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disk`] if a batch write fails; the sets stay queued
    /// and are retried by the next call.
    pub fn useless_gc(&self, num: usize) -> Result<(), Error> {
        let start = Instant::now();
        let mut guard = self.dirty.write();
        let state = &mut *guard;
        let mut batch = self.disk.new_batch();
        let mut deleted = 0usize;

        let consumed = state.useless.len().min(num);
        for set in state.useless.iter().take(consumed) {
            for hash in set {
                if !state.nodes.contains_key(hash) {
                    schema::delete_trie_node(&mut batch, hash)?;
                    deleted = deleted.saturating_add(1);
                }
                if batch.value_size() > IDEAL_BATCH_SIZE {
                    batch.write()?;
                    batch.reset();
                }
            }
        }
        batch.write()?;
        state.useless.drain(..consumed);

        debug!(
            "useless gc deleted {deleted} nodes from {consumed} sets in {:?}",
            start.elapsed()
        );
        Ok(())
    }

    /// Number of useless sets waiting for [`Database::useless_gc`].
    pub fn useless_len(&self) -> usize {
        self.dirty.read().useless.len()
    }

    /// Number of hashes across all waiting useless sets.
    pub fn useless_total(&self) -> usize {
        self.dirty.read().useless.iter().map(HashSet::len).sum()
    }

    /// Forgets every waiting useless set.
    pub fn reset_useless(&self) {
        self.dirty.write().useless.clear();
    }
}
