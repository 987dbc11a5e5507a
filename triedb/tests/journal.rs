// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

mod common;

use std::thread;
use std::time::{Duration, Instant};

use common::{build, init};
use crossbeam::channel::bounded;
use triedb::{Config, Database, TrieHash};
use triedb_storage::{MemoryDb, Node};

fn warm_database(config: Config) -> (Database<MemoryDb>, Vec<(TrieHash, Node)>) {
    let db = Database::with_config(MemoryDb::new(), config);
    let (root, leaves) = build(&db, 0..8, 100);
    let nodes = leaves
        .iter()
        .chain([&root])
        .map(|hash| (*hash, db.node(hash).unwrap()))
        .collect();
    db.commit(&root, false, true).unwrap();
    (db, nodes)
}

#[test]
fn journal_restores_the_clean_cache() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("triecache");
    let (db, nodes) = warm_database(Config::builder().clean_cache_size(1 << 20).build());
    db.save_cache(&path).unwrap();

    // an empty disk proves the nodes come from the journal
    let config = Config::builder()
        .clean_cache_size(1 << 20)
        .journal(&path)
        .build();
    let restored = Database::with_config(MemoryDb::new(), config);
    assert_eq!(restored.clean_cache().unwrap().len(), nodes.len());
    for (hash, node) in &nodes {
        assert_eq!(&restored.node(hash).unwrap(), node);
    }
}

#[test]
fn missing_journal_starts_cold() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::builder()
        .clean_cache_size(1 << 20)
        .journal(dir.path().join("absent"))
        .build();
    let db = Database::with_config(MemoryDb::new(), config);
    assert!(db.clean_cache().unwrap().is_empty());
}

#[test]
fn saving_without_clean_cache_does_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("triecache");
    let (db, _) = warm_database(Config::default());
    db.save_cache(&path).unwrap();
    assert!(!path.exists());
}

#[test]
fn periodic_saves_stop_on_request() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("triecache");
    let (db, nodes) = warm_database(Config::builder().clean_cache_size(1 << 20).build());
    let (stop, stopped) = bounded(1);

    thread::scope(|scope| {
        let saver = scope.spawn(|| {
            db.save_cache_periodically(&path, Duration::from_millis(10), &stopped);
        });
        let deadline = Instant::now() + Duration::from_secs(10);
        while !path.exists() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        stop.send(()).unwrap();
        saver.join().unwrap();
    });

    let restored = triedb::CleanCache::load_from_file_or_new(&path, 1 << 20);
    assert_eq!(restored.len(), nodes.len());
}
