// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

mod common;

use std::collections::HashSet;
use std::thread;

use common::{FailingDb, build, init, leaf};
use triedb::{Config, Database, TrieHash};
use triedb_storage::{KeyValueReader, MemoryDb, Node};

fn branch(children: &[TrieHash]) -> Node {
    Node::branch(
        children
            .iter()
            .zip(0u8..)
            .map(|(hash, nibble)| (nibble, Node::Hash(*hash))),
        None,
    )
}

#[test]
fn stale_roots_are_pruned_and_restamped_nodes_survive() {
    init();
    let db = Database::new(MemoryDb::new());

    let a = db.insert_node(leaf(1, 64));
    let b = db.insert_node(leaf(2, 64));
    let shared = db.insert_node(leaf(3, 64));
    let old_root = db.insert_node(branch(&[a, b, shared]));
    db.reference(&old_root, &TrieHash::ZERO);
    db.reference_version(&old_root);
    db.commit(&old_root, false, false).unwrap();

    db.incr_version();
    assert_eq!(db.node_version(), 1);
    let d = db.insert_node(leaf(4, 64));
    let new_root = db.insert_node(branch(&[shared, d]));
    db.reference(&new_root, &TrieHash::ZERO);
    db.reference_version(&new_root);

    db.dereference(&old_root).unwrap();

    let cached: HashSet<TrieHash> = db.nodes().into_iter().collect();
    assert_eq!(cached, HashSet::from([shared, d, new_root]));
    let stats = db.stats();
    assert_eq!(stats.gc_nodes, 3);
}

#[test]
fn forgetting_to_restamp_collects_reachable_nodes() {
    let db = Database::new(MemoryDb::new());
    let (root, _) = build(&db, 1..=4, 64);
    db.commit(&root, false, false).unwrap();
    db.incr_version();

    db.dereference(&root).unwrap();

    assert!(db.nodes().is_empty());
    assert_eq!(db.size().0, 0);
}

#[test]
fn useless_nodes_are_deleted_from_disk() {
    let disk = MemoryDb::new();
    let db = Database::new(disk.clone());
    let (root, _) = build(&db, 1..=4, 64);
    db.commit(&root, false, false).unwrap();
    assert_eq!(disk.len(), 5);
    db.incr_version();

    db.dereference_db(&root).unwrap();
    assert_eq!(db.useless_len(), 1);
    assert_eq!(db.useless_total(), 5);

    db.useless_gc(1).unwrap();
    assert_eq!(db.useless_len(), 0);
    assert!(disk.is_empty());
}

#[test]
fn readers_are_not_disturbed_by_dereference() {
    let config = Config::builder().clean_cache_size(1 << 20).build();
    let db = Database::with_config(MemoryDb::new(), config);

    let stale: Vec<TrieHash> = (0..32u8)
        .map(|round| {
            let (root, _) = build(&db, (0..8).map(|tag| round * 8 + tag), 128);
            db.commit(&root, false, false).unwrap();
            root
        })
        .collect();
    db.incr_version();
    let (kept, leaves) = build(&db, (0..8).map(|tag| tag + 1), 96);
    db.reference_version(&kept);
    let stable: Vec<(TrieHash, Node)> = leaves
        .iter()
        .chain([&kept])
        .map(|hash| (*hash, db.node(hash).unwrap()))
        .collect();

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..200 {
                    for (hash, node) in &stable {
                        assert_eq!(&db.node(hash).unwrap(), node);
                    }
                }
            });
        }
        for root in &stale {
            db.dereference(root).unwrap();
        }
    });

    let cached: HashSet<TrieHash> = db.nodes().into_iter().collect();
    assert!(stable.iter().all(|(hash, _)| cached.contains(hash)));
    assert_eq!(cached.len(), stable.len());
}

#[test]
fn failed_useless_gc_keeps_its_sets() {
    init();
    let db = Database::new(FailingDb::new(usize::MAX));
    let (root, leaves) = build(&db, 1..=3, 64);
    db.commit(&root, false, false).unwrap();
    db.incr_version();
    db.dereference_db(&root).unwrap();
    assert!(db.nodes().is_empty());
    assert_eq!(db.useless_len(), 1);

    db.disk().allow(0);
    assert!(db.useless_gc(1).is_err());
    assert_eq!(db.useless_len(), 1);
    assert_eq!(db.useless_total(), leaves.len() + 1);
    let disk = db.disk().inner();
    assert!(disk.has(root.as_ref()).unwrap());

    db.disk().allow(usize::MAX);
    db.useless_gc(1).unwrap();
    assert_eq!(db.useless_len(), 0);
    assert!(disk.is_empty());
}
