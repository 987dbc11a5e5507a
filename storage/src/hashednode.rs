// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

use sha3::{Digest, Keccak256};

use crate::{HASH_LENGTH, Node, TrieHash, encode};

/// Returns the keccak-256 digest of `data`.
#[must_use]
pub fn keccak256(data: &[u8]) -> TrieHash {
    let mut hash = [0u8; HASH_LENGTH];
    hash.copy_from_slice(&Keccak256::digest(data));
    TrieHash::from(hash)
}

/// Returns the hash of `node`, which is the keccak-256 of its encoding.
#[must_use]
pub fn hash_node(node: &Node) -> TrieHash {
    keccak256(&encode(node))
}

/// Returns how a parent should reference `node`.
///
/// Nodes whose encoding is shorter than a hash are embedded in the parent.
/// Anything larger is replaced by a [`Node::Hash`] and the encoding is
/// returned alongside so the caller can store it.
#[must_use]
pub fn reference_for(node: &Node) -> (Node, Option<Vec<u8>>) {
    let encoded = encode(node);
    if encoded.len() < HASH_LENGTH {
        (node.clone(), None)
    } else {
        (Node::Hash(keccak256(&encoded)), Some(encoded))
    }
}
