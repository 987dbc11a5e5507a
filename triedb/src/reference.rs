// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use triedb_storage::logger::{trace, warn};
use triedb_storage::{KeyValueStore, TrieHash};

use crate::Database;
use crate::cached::{CACHED_NODE_CHILDREN_SIZE, CHILD_EDGE_SIZE};
use crate::database::DirtyState;

impl DirtyState {
    pub(crate) fn reference(&mut self, child: &TrieHash, parent: &TrieHash) {
        // nodes already on disk are not tracked
        if child.is_zero() || !self.nodes.contains_key(child) {
            return;
        }
        let Some(parent_node) = self.nodes.get_mut(parent) else {
            trace!("ignoring reference from uncached parent {parent}");
            return;
        };
        let children = match &mut parent_node.children {
            Some(children) => {
                // roots may be anchored under the meta-root more than once
                if children.contains_key(child) && !parent.is_zero() {
                    return;
                }
                children
            }
            slot @ None => {
                self.children_size = self.children_size.saturating_add(CACHED_NODE_CHILDREN_SIZE);
                slot.insert(HashMap::new())
            }
        };
        let count = children.entry(*child).or_insert(0);
        *count = count.saturating_add(1);
        if *count == 1 {
            self.children_size = self.children_size.saturating_add(CHILD_EDGE_SIZE);
        }
        if let Some(child_node) = self.nodes.get_mut(child) {
            child_node.parents = child_node.parents.saturating_add(1);
        }
    }

    /// Stamps `hash` and everything cached below it with the current version.
    pub(crate) fn stamp_version(&mut self, hash: &TrieHash, visited: &mut HashSet<TrieHash>) {
        if !visited.insert(*hash) {
            return;
        }
        let Some(node) = self.nodes.get(hash) else {
            return;
        };
        for child in node.child_list() {
            self.stamp_version(&child, visited);
        }
        let version = self.version;
        if let Some(node) = self.nodes.get_mut(hash) {
            node.version = version;
        }
    }
}

impl<S: KeyValueStore> Database<S> {
    /// Records that the cached node `parent` depends on `child`, typically a
    /// storage trie root under an account leaf, or a state root under the
    /// meta-root ([`TrieHash::ZERO`]).
    ///
    /// Does nothing if `child` is not cached. Repeating an edge is a no-op,
    /// except under the meta-root where every call counts.
    pub fn reference(&self, child: &TrieHash, parent: &TrieHash) {
        self.dirty.write().reference(child, parent);
    }

    /// Tags every cached node reachable from `root` with the current version,
    /// protecting it from the next dereference.
    ///
    /// This must be called for every root that should survive after the
    /// version is incremented; nodes of a root that was rebuilt without it
    /// are collected even though they are still reachable.
    pub fn reference_version(&self, root: &TrieHash) {
        let start = Instant::now();
        self.dirty.write().stamp_version(root, &mut HashSet::new());

        let elapsed = start.elapsed();
        if elapsed > self.config.reference_version_warn {
            warn!("reference_version overtime: root {root} took {elapsed:?}");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cached::CACHED_NODE_SIZE;
    use triedb_storage::{MemoryDb, Node, Path};

    fn leaf(tag: u8) -> Node {
        Node::leaf(Path::from_key_bytes(&[tag; 32]), [tag; 40])
    }

    fn edges(db: &Database<MemoryDb>, parent: &TrieHash) -> Option<HashMap<TrieHash, u16>> {
        db.dirty.read().nodes.get(parent).unwrap().children.clone()
    }

    fn parents(db: &Database<MemoryDb>, hash: &TrieHash) -> u32 {
        db.dirty.read().nodes.get(hash).unwrap().parents
    }

    #[test]
    fn uncached_child_is_ignored() {
        let db = Database::new(MemoryDb::new());
        let parent = db.insert_node(leaf(1));
        db.reference(&TrieHash::from([7; 32]), &parent);
        assert_eq!(edges(&db, &parent), None);
        db.check_invariants();
    }

    #[test]
    fn duplicate_edges_are_idempotent() {
        let db = Database::new(MemoryDb::new());
        let parent = db.insert_node(leaf(1));
        let child = db.insert_node(leaf(2));

        db.reference(&child, &parent);
        db.reference(&child, &parent);

        assert_eq!(edges(&db, &parent), Some(HashMap::from([(child, 1)])));
        assert_eq!(parents(&db, &child), 1);
        db.check_invariants();
    }

    #[test]
    fn meta_root_counts_every_edge() {
        let db = Database::new(MemoryDb::new());
        let root = db.insert_node(leaf(1));

        db.reference(&root, &TrieHash::ZERO);
        db.reference(&root, &TrieHash::ZERO);

        assert_eq!(edges(&db, &TrieHash::ZERO), Some(HashMap::from([(root, 2)])));
        assert_eq!(parents(&db, &root), 2);
        db.check_invariants();
    }

    #[test]
    fn children_are_accounted_but_meta_root_edges_are_not() {
        let db = Database::new(MemoryDb::new());
        let parent = db.insert_node(leaf(1));
        let child = db.insert_node(leaf(2));
        let (before, _) = db.size();

        db.reference(&parent, &TrieHash::ZERO);
        assert_eq!(db.size().0, before);

        db.reference(&child, &parent);
        assert_eq!(
            db.size().0,
            before + CACHED_NODE_CHILDREN_SIZE + CHILD_EDGE_SIZE
        );
        assert!(before >= 2 * CACHED_NODE_SIZE);
    }

    #[test]
    fn meta_root_is_never_a_child() {
        let db = Database::new(MemoryDb::new());
        let parent = db.insert_node(leaf(1));
        db.reference(&TrieHash::ZERO, &parent);
        assert_eq!(edges(&db, &parent), None);
    }

    #[test]
    fn reference_version_stamps_the_reachable_subtree() {
        let db = Database::new(MemoryDb::new());
        let (a, b) = (leaf(1), leaf(2));
        let hash_a = db.insert_node(a.clone());
        let hash_b = db.insert_node(b.clone());
        let branch = Node::branch([(1, Node::Hash(hash_a)), (2, Node::Hash(hash_b))], None);
        let root = db.insert_node(branch);
        let stray = db.insert_node(leaf(3));

        db.incr_version();
        db.reference_version(&root);

        let state = db.dirty.read();
        for hash in [root, hash_a, hash_b] {
            assert_eq!(state.nodes.get(&hash).unwrap().version, 1);
        }
        assert_eq!(state.nodes.get(&stray).unwrap().version, 0);
    }
}
