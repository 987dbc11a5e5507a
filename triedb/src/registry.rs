// Copyright (C) 2025, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

//! Trie cache metric definitions.

use metrics::{describe_counter, describe_histogram};

/// Clean cache hits.
pub const CLEAN_HIT: &str = "trie.memcache.clean.hit";
/// Clean cache misses that were filled from disk.
pub const CLEAN_MISS: &str = "trie.memcache.clean.miss";
/// Bytes read from the clean cache.
pub const CLEAN_READ: &str = "trie.memcache.clean.read";
/// Bytes written into the clean cache.
pub const CLEAN_WRITE: &str = "trie.memcache.clean.write";

/// Dirty cache hits.
pub const DIRTY_HIT: &str = "trie.memcache.dirty.hit";
/// Dirty cache misses.
pub const DIRTY_MISS: &str = "trie.memcache.dirty.miss";
/// Bytes read from the dirty cache.
pub const DIRTY_READ: &str = "trie.memcache.dirty.read";
/// Bytes inserted into the dirty cache.
pub const DIRTY_WRITE: &str = "trie.memcache.dirty.write";

/// Nodes flushed to disk by `cap`.
pub const FLUSH_NODES: &str = "trie.memcache.flush.nodes";
/// Bytes flushed to disk by `cap`.
pub const FLUSH_SIZE: &str = "trie.memcache.flush.size";
/// Time spent in `cap`, in seconds.
pub const FLUSH_TIME: &str = "trie.memcache.flush.time";

/// Nodes dropped by dereferencing.
pub const GC_NODES: &str = "trie.memcache.gc.nodes";
/// Bytes dropped by dereferencing.
pub const GC_SIZE: &str = "trie.memcache.gc.size";
/// Time spent dereferencing, in seconds.
pub const GC_TIME: &str = "trie.memcache.gc.time";

/// Nodes removed from the dirty cache by `commit`.
pub const COMMIT_NODES: &str = "trie.memcache.commit.nodes";
/// Bytes removed from the dirty cache by `commit`.
pub const COMMIT_SIZE: &str = "trie.memcache.commit.size";
/// Time spent in `commit`, in seconds.
pub const COMMIT_TIME: &str = "trie.memcache.commit.time";

/// Registers all trie cache metric descriptions, along with the storage ones.
pub fn register() {
    triedb_storage::registry::register();

    describe_counter!(CLEAN_HIT, "Clean cache hits");
    describe_counter!(CLEAN_MISS, "Clean cache misses that were filled from disk");
    describe_counter!(CLEAN_READ, "Bytes read from the clean cache");
    describe_counter!(CLEAN_WRITE, "Bytes written into the clean cache");

    describe_counter!(DIRTY_HIT, "Dirty cache hits");
    describe_counter!(DIRTY_MISS, "Dirty cache misses");
    describe_counter!(DIRTY_READ, "Bytes read from the dirty cache");
    describe_counter!(DIRTY_WRITE, "Bytes inserted into the dirty cache");

    describe_counter!(FLUSH_NODES, "Nodes flushed to disk by cap");
    describe_counter!(FLUSH_SIZE, "Bytes flushed to disk by cap");
    describe_histogram!(FLUSH_TIME, "Time spent in cap, in seconds");

    describe_counter!(GC_NODES, "Nodes dropped by dereferencing");
    describe_counter!(GC_SIZE, "Bytes dropped by dereferencing");
    describe_histogram!(GC_TIME, "Time spent dereferencing, in seconds");

    describe_counter!(COMMIT_NODES, "Nodes removed from the dirty cache by commit");
    describe_counter!(COMMIT_SIZE, "Bytes removed from the dirty cache by commit");
    describe_histogram!(COMMIT_TIME, "Time spent in commit, in seconds");
}
