// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

use smallvec::SmallVec;
use std::borrow::Cow;
use std::collections::HashMap;

use triedb_storage::{DecodeError, HASH_LENGTH, Node, TrieHash, decode, encode};

/// Approximate footprint of a [`CachedNode`] record, excluding node data.
pub(crate) const CACHED_NODE_SIZE: usize = size_of::<CachedNode>();

/// Footprint of an initialized but empty explicit children map.
pub(crate) const CACHED_NODE_CHILDREN_SIZE: usize = 48;

/// Footprint of one explicit child edge: the hash plus a u16 counter.
pub(crate) const CHILD_EDGE_SIZE: usize = HASH_LENGTH + 2;

/// What the cache holds for a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CachedContent {
    /// A decoded trie node; its hash children are tracked implicitly
    Collapsed(Node),
    /// Opaque encoded bytes, such as contract code; never inspected
    Raw(Box<[u8]>),
}

/// Everything the cache knows about one dirty node.
#[derive(Debug)]
pub(crate) struct CachedNode {
    pub(crate) content: CachedContent,
    /// Encoded length of the node
    pub(crate) size: usize,
    /// Number of cached nodes that reference this one explicitly
    pub(crate) parents: u32,
    /// Explicitly referenced children, such as storage roots under an account
    pub(crate) children: Option<HashMap<TrieHash, u16>>,
    pub(crate) flush_prev: Option<TrieHash>,
    pub(crate) flush_next: Option<TrieHash>,
    pub(crate) version: u64,
}

impl CachedNode {
    pub(crate) const fn new(content: CachedContent, size: usize, version: u64) -> Self {
        Self {
            content,
            size,
            parents: 0,
            children: None,
            flush_prev: None,
            flush_next: None,
            version,
        }
    }

    /// The meta-root record, which only carries explicit children.
    pub(crate) fn meta_root() -> Self {
        let mut root = Self::new(CachedContent::Raw(Box::default()), 0, 0);
        root.children = Some(HashMap::new());
        root
    }

    pub(crate) const fn is_raw(&self) -> bool {
        matches!(self.content, CachedContent::Raw(_))
    }

    /// The encoded node, borrowed for raw content and regenerated otherwise.
    pub(crate) fn encoded(&self) -> Cow<'_, [u8]> {
        match &self.content {
            CachedContent::Raw(blob) => Cow::Borrowed(blob),
            CachedContent::Collapsed(node) => Cow::Owned(encode(node)),
        }
    }

    /// The decoded node.
    pub(crate) fn obj(&self) -> Result<Node, DecodeError> {
        match &self.content {
            CachedContent::Raw(blob) => decode(blob),
            CachedContent::Collapsed(node) => Ok(node.clone()),
        }
    }

    /// Invokes `on_child` for the explicit children followed by the hash
    /// children embedded in the node itself. Raw blobs have no implicit children.
    pub(crate) fn for_childs(&self, mut on_child: impl FnMut(TrieHash)) {
        if let Some(children) = &self.children {
            children.keys().copied().for_each(&mut on_child);
        }
        if let CachedContent::Collapsed(node) = &self.content {
            node.for_each_child_hash(&mut on_child);
        }
    }

    /// The children as a list, so the caller may mutate the cache while walking them.
    pub(crate) fn child_list(&self) -> SmallVec<[TrieHash; 16]> {
        let mut list = SmallVec::new();
        self.for_childs(|hash| list.push(hash));
        list
    }

    /// Bytes accounted to the explicit children map.
    pub(crate) fn children_size(&self) -> usize {
        self.children.as_ref().map_or(0, |children| {
            CACHED_NODE_CHILDREN_SIZE.saturating_add(children.len().saturating_mul(CHILD_EDGE_SIZE))
        })
    }
}
