// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

//! Where the trie cache keeps things in the key-value store.
//!
//! Trie nodes are stored under their raw 32 byte hash. Preimages are stored
//! under [`PREIMAGE_PREFIX`] followed by the hash.

use crate::{DiskError, HASH_LENGTH, KeyValueReader, KeyValueWriter, TrieHash};

/// Prefix of every preimage key.
pub const PREIMAGE_PREFIX: &[u8] = b"secure-key-";

/// Length of a preimage key.
pub const PREIMAGE_KEY_LENGTH: usize = PREIMAGE_PREFIX.len() + HASH_LENGTH;

/// Returns the key a preimage of `hash` is stored under.
#[must_use]
pub fn preimage_key(hash: &TrieHash) -> [u8; PREIMAGE_KEY_LENGTH] {
    let mut key = [0u8; PREIMAGE_KEY_LENGTH];
    let (prefix, suffix) = key.split_at_mut(PREIMAGE_PREFIX.len());
    prefix.copy_from_slice(PREIMAGE_PREFIX);
    suffix.copy_from_slice(hash.as_ref());
    key
}

/// Reads the encoded trie node stored under `hash`.
///
/// # Errors
///
/// Returns a [`DiskError`] if the store fails.
pub fn read_trie_node(
    db: &(impl KeyValueReader + ?Sized),
    hash: &TrieHash,
) -> Result<Option<Box<[u8]>>, DiskError> {
    db.get(hash.as_ref())
}

/// Queues the encoded trie node `node` under `hash`.
///
/// # Errors
///
/// Returns a [`DiskError`] if the writer refuses the write.
pub fn write_trie_node(
    writer: &mut (impl KeyValueWriter + ?Sized),
    hash: &TrieHash,
    node: &[u8],
) -> Result<(), DiskError> {
    writer.put(hash.as_ref(), node)
}

/// Queues removal of the trie node stored under `hash`.
///
/// # Errors
///
/// Returns a [`DiskError`] if the writer refuses the delete.
pub fn delete_trie_node(
    writer: &mut (impl KeyValueWriter + ?Sized),
    hash: &TrieHash,
) -> Result<(), DiskError> {
    writer.delete(hash.as_ref())
}

/// Reads the preimage of `hash`.
///
/// # Errors
///
/// Returns a [`DiskError`] if the store fails.
pub fn read_preimage(
    db: &(impl KeyValueReader + ?Sized),
    hash: &TrieHash,
) -> Result<Option<Box<[u8]>>, DiskError> {
    db.get(&preimage_key(hash))
}

/// Queues every `(hash, preimage)` pair.
///
/// # Errors
///
/// Returns a [`DiskError`] if the writer refuses a write.
pub fn write_preimages<'a>(
    writer: &mut (impl KeyValueWriter + ?Sized),
    preimages: impl IntoIterator<Item = (&'a TrieHash, &'a Box<[u8]>)>,
) -> Result<(), DiskError> {
    preimages
        .into_iter()
        .try_for_each(|(hash, preimage)| writer.put(&preimage_key(hash), preimage))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{Batch, KeyValueStore, MemoryDb};
    use std::collections::HashMap;

    #[test]
    fn preimage_key_layout() {
        let hash = TrieHash::from([0xaa; HASH_LENGTH]);
        let key = preimage_key(&hash);
        assert_eq!(&key[..11], b"secure-key-");
        assert_eq!(&key[11..], &[0xaa; HASH_LENGTH]);
    }

    #[test]
    fn nodes_and_preimages_do_not_collide() {
        let db = MemoryDb::new();
        let hash = TrieHash::from([1; HASH_LENGTH]);
        let preimages = HashMap::from([(hash, Box::<[u8]>::from(&b"key"[..]))]);

        let mut batch = db.new_batch();
        write_trie_node(&mut batch, &hash, b"node").unwrap();
        write_preimages(&mut batch, &preimages).unwrap();
        batch.write().unwrap();

        assert_eq!(
            read_trie_node(&db, &hash).unwrap().as_deref(),
            Some(&b"node"[..])
        );
        assert_eq!(
            read_preimage(&db, &hash).unwrap().as_deref(),
            Some(&b"key"[..])
        );

        let mut batch = db.new_batch();
        delete_trie_node(&mut batch, &hash).unwrap();
        batch.write().unwrap();
        assert_eq!(read_trie_node(&db, &hash).unwrap(), None);
        assert!(read_preimage(&db, &hash).unwrap().is_some());
    }
}
