// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

use std::io;

use triedb_storage::{DecodeError, DiskError, TrieHash};

/// Errors returned by the trie [`Database`](crate::Database).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The node is in neither the clean cache, the dirty cache nor on disk
    #[error("trie node {0} not found")]
    NotFound(TrieHash),

    /// The key-value store failed
    #[error("disk error: {0}")]
    Disk(#[from] DiskError),

    /// Stored bytes are not a valid trie node
    #[error("failed to decode trie node {hash}: {source}")]
    Decode {
        /// The hash the bytes were stored under
        hash: TrieHash,
        /// Why decoding failed
        source: DecodeError,
    },

    /// The meta-root anchors every tracked root and cannot be dereferenced
    #[error("attempted to dereference the trie cache meta-root")]
    MetaRoot,

    /// Reading or writing the clean cache journal failed
    #[error("clean cache journal error: {0}")]
    Journal(#[from] io::Error),
}

impl Error {
    pub(crate) const fn decode(hash: TrieHash, source: DecodeError) -> Self {
        Error::Decode { hash, source }
    }
}
