// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

#![warn(missing_debug_implementations, rust_2018_idioms, missing_docs)]
#![deny(unsafe_code)]
#![cfg_attr(
    not(target_pointer_width = "64"),
    forbid(
        clippy::cast_possible_truncation,
        reason = "non-64 bit target likely to cause issues during u64 to usize conversions"
    )
)]

//! # triedb-storage holds everything the trie cache needs below it
//!
//! - the collapsed [`Node`] representation and its canonical [`encode`] /
//!   [`decode`] form, which is also what [`hash_node`] hashes;
//! - the key-value store interfaces ([`KeyValueReader`], [`KeyValueWriter`],
//!   [`Batch`], [`KeyValueStore`]) with an in-memory [`MemoryDb`] and, behind
//!   the `fjall` feature, a persistent `FjallDb`;
//! - the [`schema`] describing which key each record is stored under.

mod hashednode;
mod kv;
mod node;
mod trie_hash;

/// Logger module for handling logging functionality
pub mod logger;

/// Metric names used by the storage layer
pub mod registry;

pub mod schema;

// re-export these so callers don't need to know where they are
pub use hashednode::{hash_node, keccak256, reference_for};
#[cfg(feature = "fjall")]
pub use kv::fjall::{FjallBatch, FjallDb};
pub use kv::memory::{MemoryBatch, MemoryDb};
pub use kv::{
    Batch, BatchOp, DiskError, IDEAL_BATCH_SIZE, KeyValueReader, KeyValueStore, KeyValueWriter,
};
pub use node::codec::{DecodeError, decode, encode};
pub use node::path::{Path, TERMINATOR};
pub use node::{FULL_NODE_SLOTS, FullNode, Node, ShortNode};
pub use trie_hash::{HASH_LENGTH, InvalidTrieHashLength, TrieHash};
