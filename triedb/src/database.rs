// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

use crossbeam::channel::{Receiver, select, tick};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::time::{Duration, Instant};

use triedb_storage::logger::{error, info, trace};
use triedb_storage::{
    HASH_LENGTH, KeyValueStore, Node, TrieHash, decode, encode, hash_node, schema,
};

use crate::cached::{CACHED_NODE_SIZE, CHILD_EDGE_SIZE, CachedContent, CachedNode};
use crate::cleans::CleanCache;
use crate::flushlist::{FlushList, NodeMap};
use crate::{Config, Error, registry};

/// Garbage collection and flush statistics accumulated since the last commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Nodes dropped by dereferencing
    pub gc_nodes: u64,
    /// Bytes dropped by dereferencing
    pub gc_size: usize,
    /// Time spent dereferencing
    pub gc_time: Duration,
    /// Nodes flushed by `cap`
    pub flush_nodes: u64,
    /// Bytes flushed by `cap`
    pub flush_size: usize,
    /// Time spent in `cap`
    pub flush_time: Duration,
}

/// Everything guarded by the database lock.
#[derive(Debug)]
pub(crate) struct DirtyState {
    /// The dirty nodes, plus the meta-root under the zero hash
    pub(crate) nodes: NodeMap,
    pub(crate) flush: FlushList,
    /// Nodes inserted since the last commit
    pub(crate) fresh: HashSet<TrieHash>,
    pub(crate) version: u64,
    /// Hash sets dropped by `dereference_db` that may still be on disk
    pub(crate) useless: VecDeque<HashSet<TrieHash>>,
    /// `None` when preimage recording is disabled
    pub(crate) preimages: Option<HashMap<TrieHash, Box<[u8]>>>,
    /// Sum of hash length plus encoded size over every dirty node
    pub(crate) dirties_size: usize,
    /// Bytes accounted to explicit children maps. The meta-root only
    /// contributes its edges, never the map itself.
    pub(crate) children_size: usize,
    pub(crate) preimages_size: usize,
    pub(crate) stats: Stats,
}

impl DirtyState {
    pub(crate) fn new(preimages: bool) -> Self {
        Self {
            nodes: HashMap::from([(TrieHash::ZERO, CachedNode::meta_root())]),
            flush: FlushList::default(),
            fresh: HashSet::new(),
            version: 0,
            useless: VecDeque::new(),
            preimages: preimages.then(HashMap::new),
            dirties_size: 0,
            children_size: 0,
            preimages_size: 0,
            stats: Stats::default(),
        }
    }

    /// Adds a node to the newest end of the flush list, unless it is already cached.
    pub(crate) fn insert(&mut self, hash: TrieHash, content: CachedContent, size: usize) {
        if self.nodes.contains_key(&hash) {
            return;
        }
        metrics::counter!(registry::DIRTY_WRITE).increment(size as u64);

        self.nodes
            .insert(hash, CachedNode::new(content, size, self.version));
        self.flush.push_back(&mut self.nodes, hash);
        self.fresh.insert(hash);
        self.dirties_size = self
            .dirties_size
            .saturating_add(HASH_LENGTH.saturating_add(size));
    }

    /// Removes a node, its fresh marker and its size accounting. The caller is
    /// responsible for the flush list.
    pub(crate) fn remove_node(&mut self, hash: &TrieHash) -> Option<CachedNode> {
        let node = self.nodes.remove(hash)?;
        self.fresh.remove(hash);
        self.dirties_size = self
            .dirties_size
            .saturating_sub(HASH_LENGTH.saturating_add(node.size));
        self.children_size = self.children_size.saturating_sub(node.children_size());
        Some(node)
    }

    /// Number of distinct roots anchored under the meta-root.
    pub(crate) fn meta_root_edges(&self) -> usize {
        self.nodes
            .get(&TrieHash::ZERO)
            .and_then(|root| root.children.as_ref())
            .map_or(0, HashMap::len)
    }

    /// Memory used by the dirty nodes including record and children overhead.
    pub(crate) fn memory_size(&self) -> usize {
        let records = self.nodes.len().saturating_sub(1);
        self.dirties_size
            .saturating_add(records.saturating_mul(CACHED_NODE_SIZE))
            .saturating_add(self.children_size)
            .saturating_sub(self.meta_root_edges().saturating_mul(CHILD_EDGE_SIZE))
    }
}

/// A write-back cache of trie nodes in front of a key-value store.
///
/// New nodes are kept in memory until they are either flushed with
/// [`Database::cap`], persisted with [`Database::commit`] or dropped with
/// [`Database::dereference`]. Lookups consult the clean cache, then the dirty
/// nodes and finally the disk.
///
/// Mutations take the internal lock exclusively. Lookups only take it in
/// shared mode, and the clean cache and disk are read without it, so readers
/// are not blocked by slow disk writes.
#[derive(Debug)]
pub struct Database<S> {
    pub(crate) disk: S,
    pub(crate) cleans: Option<CleanCache>,
    pub(crate) dirty: RwLock<DirtyState>,
    pub(crate) config: Config,
}

impl<S: KeyValueStore> Database<S> {
    /// Creates a database without a clean cache, recording preimages.
    pub fn new(disk: S) -> Self {
        Self::with_config(disk, Config::default())
    }

    /// Creates a database with the given configuration. If a journal is
    /// configured, the clean cache is restored from it.
    pub fn with_config(disk: S, config: Config) -> Self {
        let cleans = (config.clean_cache_size > 0).then(|| match &config.journal {
            Some(journal) => CleanCache::load_from_file_or_new(journal, config.clean_cache_size),
            None => CleanCache::new(config.clean_cache_size),
        });
        Self {
            disk,
            cleans,
            dirty: RwLock::new(DirtyState::new(config.preimages)),
            config,
        }
    }

    /// The persistent store behind this cache.
    pub const fn disk(&self) -> &S {
        &self.disk
    }

    /// The configuration this database was created with.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The clean cache, if one is configured.
    pub const fn clean_cache(&self) -> Option<&CleanCache> {
        self.cleans.as_ref()
    }

    /// The version new nodes are tagged with.
    pub fn node_version(&self) -> u64 {
        self.dirty.read().version
    }

    /// Starts a new version. Nodes not stamped with it become eligible for
    /// dereferencing.
    pub fn incr_version(&self) {
        let mut state = self.dirty.write();
        state.version = state.version.saturating_add(1);
    }

    /// Caches a collapsed node whose encoding is `size` bytes long. Inserting
    /// a hash that is already cached does nothing.
    pub fn insert(&self, hash: TrieHash, size: usize, node: Node) {
        self.dirty
            .write()
            .insert(hash, CachedContent::Collapsed(node), size);
    }

    /// Caches an opaque blob, such as contract code. Blobs never have
    /// implicit children.
    pub fn insert_blob(&self, hash: TrieHash, blob: impl Into<Box<[u8]>>) {
        let blob = blob.into();
        let size = blob.len();
        self.dirty.write().insert(hash, CachedContent::Raw(blob), size);
    }

    /// Encodes and hashes `node`, caches it and returns its hash.
    pub fn insert_node(&self, node: Node) -> TrieHash {
        let encoded = encode(&node);
        let hash = hash_node(&node);
        self.insert(hash, encoded.len(), node);
        hash
    }

    /// Returns the decoded node stored under `hash`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the node is nowhere to be found,
    /// [`Error::Decode`] if its bytes are not a trie node and
    /// [`Error::Disk`] if the store fails.
    pub fn node(&self, hash: &TrieHash) -> Result<Node, Error> {
        if hash.is_zero() {
            return Err(Error::NotFound(*hash));
        }
        let decoded = if let Some(encoded) = self.clean_get(hash) {
            decode(&encoded)
        } else if let Some(decoded) = self.dirty_get(hash, CachedNode::obj) {
            decoded
        } else if let Some(encoded) = self.disk_get(hash)? {
            decode(&encoded)
        } else {
            return Err(Error::NotFound(*hash));
        };
        decoded.map_err(|source| Error::decode(*hash, source))
    }

    /// Returns the encoded node stored under `hash`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the node is nowhere to be found and
    /// [`Error::Disk`] if the store fails.
    pub fn node_blob(&self, hash: &TrieHash) -> Result<Box<[u8]>, Error> {
        if hash.is_zero() {
            return Err(Error::NotFound(*hash));
        }
        if let Some(encoded) = self.clean_get(hash) {
            return Ok(encoded);
        }
        if let Some(encoded) = self.dirty_get(hash, |node| Box::from(node.encoded())) {
            return Ok(encoded);
        }
        self.disk_get(hash)?.ok_or(Error::NotFound(*hash))
    }

    fn clean_get(&self, hash: &TrieHash) -> Option<Box<[u8]>> {
        let encoded = self.cleans.as_ref()?.get(hash)?;
        metrics::counter!(registry::CLEAN_HIT).increment(1);
        metrics::counter!(registry::CLEAN_READ).increment(encoded.len() as u64);
        Some(encoded)
    }

    fn dirty_get<T>(&self, hash: &TrieHash, read: impl FnOnce(&CachedNode) -> T) -> Option<T> {
        let state = self.dirty.read();
        let Some(node) = state.nodes.get(hash) else {
            metrics::counter!(registry::DIRTY_MISS).increment(1);
            return None;
        };
        metrics::counter!(registry::DIRTY_HIT).increment(1);
        metrics::counter!(registry::DIRTY_READ).increment(node.size as u64);
        Some(read(node))
    }

    fn disk_get(&self, hash: &TrieHash) -> Result<Option<Box<[u8]>>, Error> {
        let Some(encoded) = schema::read_trie_node(&self.disk, hash)? else {
            return Ok(None);
        };
        if encoded.is_empty() {
            return Ok(None);
        }
        if let Some(cleans) = &self.cleans {
            cleans.set(*hash, encoded.clone());
            metrics::counter!(registry::CLEAN_MISS).increment(1);
            metrics::counter!(registry::CLEAN_WRITE).increment(encoded.len() as u64);
        }
        Ok(Some(encoded))
    }

    /// The hashes of every dirty node. Expensive; meant for diagnostics and tests.
    pub fn nodes(&self) -> Vec<TrieHash> {
        self.dirty
            .read()
            .nodes
            .keys()
            .filter(|hash| !hash.is_zero())
            .copied()
            .collect()
    }

    /// Returns the memory used by the dirty nodes, including bookkeeping, and
    /// the memory used by the recorded preimages.
    pub fn size(&self) -> (usize, usize) {
        let state = self.dirty.read();
        (state.memory_size(), state.preimages_size)
    }

    /// Statistics accumulated since the last commit.
    pub fn stats(&self) -> Stats {
        self.dirty.read().stats
    }

    /// Writes the clean cache to the journal at `path`. Does nothing when no
    /// clean cache is configured.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Journal`] if the journal cannot be written.
    pub fn save_cache(&self, path: &Path) -> Result<(), Error> {
        let Some(cleans) = &self.cleans else {
            return Ok(());
        };
        info!("writing clean trie cache to {}", path.display());

        let start = Instant::now();
        match cleans.save_to_file(path) {
            Ok(count) => {
                info!(
                    "persisted {count} clean trie cache entries to {} in {:?}",
                    path.display(),
                    start.elapsed()
                );
                Ok(())
            }
            Err(err) => {
                error!("failed to persist clean trie cache: {err}");
                Err(Error::Journal(err))
            }
        }
    }

    /// Saves the clean cache to `path` every `interval` until `stop` receives
    /// a message or is disconnected. Blocks the calling thread.
    pub fn save_cache_periodically(&self, path: &Path, interval: Duration, stop: &Receiver<()>) {
        let ticker = tick(interval);
        loop {
            select! {
                recv(ticker) -> _ => {
                    // failures are logged by save_cache and retried next tick
                    let _ = self.save_cache(path);
                }
                recv(stop) -> _ => {
                    trace!("stopped saving the clean trie cache");
                    return;
                }
            }
        }
    }

    #[cfg(test)]
    /// Panics if the cached state is internally inconsistent.
    pub(crate) fn check_invariants(&self) {
        let state = self.dirty.read();

        let listed: Vec<TrieHash> = state.flush.iter(&state.nodes).collect();
        let mut reversed: Vec<TrieHash> = state.flush.iter_rev(&state.nodes).collect();
        reversed.reverse();
        assert_eq!(listed, reversed, "flush list differs between directions");
        assert_eq!(listed.len(), state.nodes.len() - 1, "flush list misses nodes");
        assert!(listed.iter().all(|hash| !hash.is_zero()));
        assert_eq!(
            listed.iter().collect::<HashSet<_>>().len(),
            listed.len(),
            "flush list repeats nodes"
        );

        let payload: usize = state
            .nodes
            .iter()
            .filter(|(hash, _)| !hash.is_zero())
            .map(|(_, node)| HASH_LENGTH + node.size)
            .sum();
        assert_eq!(state.dirties_size, payload, "dirty size accounting drifted");

        // the meta-root's map itself is not accounted, only its edges
        let children: usize = state
            .nodes
            .iter()
            .filter(|(hash, _)| !hash.is_zero())
            .map(|(_, node)| node.children_size())
            .sum::<usize>()
            + state.meta_root_edges() * CHILD_EDGE_SIZE;
        assert_eq!(state.children_size, children, "children accounting drifted");

        assert!(
            state.fresh.iter().all(|hash| state.nodes.contains_key(hash)),
            "fresh marker outlived its node"
        );
    }
}
