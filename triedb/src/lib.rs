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

//! # triedb is a write-back cache of trie nodes
//!
//! A [`Database`] sits between an in-memory Merkle trie and a persistent
//! key-value store. The trie inserts every node it creates; the database
//! deduplicates them by hash, remembers which roots reach them and decides
//! when they reach the disk:
//!
//! - [`Database::cap`] flushes the oldest nodes once memory runs short,
//! - [`Database::commit`] persists everything a root needs,
//! - [`Database::dereference`] drops stale nodes without a disk round trip.
//!
//! Reads go through an optional [`CleanCache`] of encoded nodes, then the
//! dirty nodes and finally the disk.
//!
//! ## Versions
//!
//! Every dirty node is stamped with the database version it was inserted
//! (or last [`Database::reference_version`]ed) at. Dereferencing only drops
//! nodes stamped with an older version than the current one, so a caller
//! that wants a root to survive [`Database::incr_version`] must re-stamp it.
//!
//! ## Logging
//!
//! Logging goes through the `log` crate when the `logger` feature is on, and
//! compiles away otherwise.

mod cached;
mod cap;
mod cleans;
mod commit;
mod config;
mod database;
mod error;
mod flushlist;
mod preimage;
mod prune;
mod reference;

/// Metric names used by the trie cache
pub mod registry;

pub use cleans::CleanCache;
pub use config::{
    Config, DEREFERENCE_TIME_LIMIT, PREIMAGE_FLUSH_THRESHOLD, REFERENCE_VERSION_WARN,
};
pub use database::{Database, Stats};
pub use error::Error;
pub use triedb_storage::{TrieHash, logger};
