// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

//! The flush list orders dirty nodes from oldest to newest insertion.
//!
//! The links live inside the [`CachedNode`] records and name neighbours by
//! hash, so the list is only meaningful together with the map that owns the
//! records. `None` marks either end.

use std::collections::HashMap;

use triedb_storage::TrieHash;

use crate::cached::CachedNode;

pub(crate) type NodeMap = HashMap<TrieHash, CachedNode>;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FlushList {
    pub(crate) oldest: Option<TrieHash>,
    pub(crate) newest: Option<TrieHash>,
}

impl FlushList {
    /// Appends `hash`, which must already be in `nodes`, to the newest end.
    pub(crate) fn push_back(&mut self, nodes: &mut NodeMap, hash: TrieHash) {
        let prev = self.newest;
        if let Some(node) = nodes.get_mut(&hash) {
            node.flush_prev = prev;
            node.flush_next = None;
        }
        match prev.and_then(|prev| nodes.get_mut(&prev)) {
            Some(tail) => tail.flush_next = Some(hash),
            None => self.oldest = Some(hash),
        }
        self.newest = Some(hash);
    }

    /// Splices `hash` out of the list, joining its neighbours. An entry that
    /// is not on the list leaves the list untouched.
    pub(crate) fn unlink(&mut self, nodes: &mut NodeMap, hash: &TrieHash) {
        let Some(node) = nodes.get_mut(hash) else {
            return;
        };
        let (prev, next) = (node.flush_prev.take(), node.flush_next.take());

        match prev.and_then(|prev| nodes.get_mut(&prev)) {
            Some(prev_node) => prev_node.flush_next = next,
            None if self.oldest == Some(*hash) => self.oldest = next,
            None => {}
        }
        match next.and_then(|next| nodes.get_mut(&next)) {
            Some(next_node) => next_node.flush_prev = prev,
            None if self.newest == Some(*hash) => self.newest = prev,
            None => {}
        }
    }

    /// Cuts the list so that `new_oldest` becomes its head. Every entry before
    /// it must already have been removed from `nodes`.
    pub(crate) fn truncate_front(&mut self, nodes: &mut NodeMap, new_oldest: Option<TrieHash>) {
        self.oldest = new_oldest;
        match new_oldest.and_then(|hash| nodes.get_mut(&hash)) {
            Some(head) => head.flush_prev = None,
            None => self.newest = None,
        }
    }

    /// Walks the list from oldest to newest.
    pub(crate) fn iter<'a>(&self, nodes: &'a NodeMap) -> impl Iterator<Item = TrieHash> + use<'a> {
        std::iter::successors(self.oldest, move |hash| {
            nodes.get(hash).and_then(|node| node.flush_next)
        })
    }

    /// Walks the list from newest to oldest.
    pub(crate) fn iter_rev<'a>(&self, nodes: &'a NodeMap) -> impl Iterator<Item = TrieHash> + use<'a> {
        std::iter::successors(self.newest, move |hash| {
            nodes.get(hash).and_then(|node| node.flush_prev)
        })
    }
}
