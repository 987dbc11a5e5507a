// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

mod common;

use common::{FailingDb, build, init, leaf};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use test_case::test_case;
use triedb::{Config, Database, Error, TrieHash};
use triedb_storage::{KeyValueReader, MemoryDb, Node, encode, hash_node};

#[test]
fn inserting_twice_changes_nothing() {
    let db = Database::new(MemoryDb::new());
    let node = leaf(1, 100);
    let hash = db.insert_node(node.clone());
    let before = (db.nodes(), db.size());

    assert_eq!(db.insert_node(node.clone()), hash);
    db.insert(hash, encode(&node).len(), node);

    assert_eq!((db.nodes(), db.size()), before);
}

#[test]
fn unknown_and_zero_hashes_are_not_found() {
    let db = Database::new(MemoryDb::new());
    let missing = TrieHash::from([9; 32]);
    assert!(matches!(db.node(&missing), Err(Error::NotFound(hash)) if hash == missing));
    assert!(matches!(db.node_blob(&TrieHash::ZERO), Err(Error::NotFound(_))));
}

#[test]
fn blobs_round_trip_without_decoding() {
    let db = Database::new(MemoryDb::new());
    let hash = TrieHash::from([4; 32]);
    db.insert_blob(hash, &b"contract code"[..]);

    assert_eq!(&*db.node_blob(&hash).unwrap(), b"contract code");
    assert!(matches!(db.node(&hash), Err(Error::Decode { .. })));
}

#[test_case(0; "without clean cache")]
#[test_case(1 << 20; "with clean cache")]
fn nodes_survive_cap(clean_cache_size: usize) {
    init();
    let config = Config::builder().clean_cache_size(clean_cache_size).build();
    let db = Database::with_config(MemoryDb::new(), config);
    let (root, leaves) = build(&db, 0..16, 200);
    let hashes: Vec<TrieHash> = leaves.iter().copied().chain([root]).collect();
    let before: Vec<Node> = hashes.iter().map(|hash| db.node(hash).unwrap()).collect();

    db.cap(0).unwrap();

    assert!(db.nodes().is_empty());
    for (hash, node) in hashes.iter().zip(&before) {
        assert!(db.disk().has(hash.as_ref()).unwrap());
        assert_eq!(&db.node(hash).unwrap(), node);
        assert_eq!(&*db.node_blob(hash).unwrap(), encode(node).as_slice());
    }
}

#[test]
fn cap_respects_the_limit() {
    let mut rng = StdRng::seed_from_u64(42);
    let db = Database::new(MemoryDb::new());
    let mut inserted = Vec::new();
    for _ in 0..500 {
        let mut key = [0u8; 32];
        rng.fill(&mut key[..]);
        let len = rng.random_range(1..2048);
        let node = Node::leaf(triedb_storage::Path::from_key_bytes(&key), vec![7; len]);
        assert_eq!(db.insert_node(node.clone()), hash_node(&node));
        inserted.push(node);
    }

    let (mut limit, _) = db.size();
    while limit > 0 {
        limit = limit.saturating_sub(rng.random_range(1..limit.max(2) / 2 + 2));
        db.cap(limit).unwrap();
        assert!(db.size().0 <= limit, "{} over {limit}", db.size().0);
    }

    assert_eq!(db.disk().len(), inserted.len());
    for node in &inserted {
        assert_eq!(&db.node(&hash_node(node)).unwrap(), node);
    }
}

#[test]
fn cached_hashes_exclude_the_meta_root() {
    let db = Database::new(MemoryDb::new());
    let (root, leaves) = build(&db, 1..=3, 64);
    let mut nodes = db.nodes();
    nodes.sort();
    let mut expected: Vec<TrieHash> = leaves.into_iter().chain([root]).collect();
    expected.sort();
    assert_eq!(nodes, expected);
}

#[test]
fn failed_cap_evicts_nothing() {
    init();
    let db = Database::new(FailingDb::new(0));
    let (root, leaves) = build(&db, 0..4, 256);
    let mut cached = db.nodes();
    cached.sort();
    let size = db.size();

    assert!(matches!(db.cap(0), Err(Error::Disk(_))));

    let mut after = db.nodes();
    after.sort();
    assert_eq!(after, cached);
    assert_eq!(db.size(), size);
    assert!(db.disk().inner().is_empty());

    db.disk().allow(1);
    db.cap(0).unwrap();
    assert!(db.nodes().is_empty());
    assert_eq!(db.disk().inner().len(), leaves.len() + 1);
    assert!(db.node(&root).is_ok());
}
