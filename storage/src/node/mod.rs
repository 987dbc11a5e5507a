// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

use enum_as_inner::EnumAsInner;
use smallvec::SmallVec;
use std::fmt::Debug;

pub(crate) mod codec;
pub mod path;

use crate::{Path, TrieHash};

/// Number of child slots in a [`FullNode`]: sixteen nibble children plus the value slot.
pub const FULL_NODE_SLOTS: usize = 17;

/// A collapsed trie node, as stored in the cache and on disk.
///
/// Children of a [`ShortNode`] or [`FullNode`] are either [`Node::Hash`]
/// references to separately stored nodes, or nodes whose encoding is small
/// enough to be embedded in their parent.
#[derive(PartialEq, Eq, Clone, Debug, EnumAsInner)]
pub enum Node {
    /// An extension or leaf node
    Short(Box<ShortNode>),
    /// A sixteen-way branch with an optional value
    Full(Box<FullNode>),
    /// A reference to a node stored under this hash
    Hash(TrieHash),
    /// The value held by a leaf or branch
    Value(Box<[u8]>),
}

/// A node with a partial path and a single child.
///
/// If `key` ends with the terminator nibble this is a leaf and `val` is a
/// [`Node::Value`]; otherwise it is an extension and `val` references the
/// next node down.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct ShortNode {
    /// The partial path covered by this node, as nibbles
    pub key: Path,
    /// The value or child below this node
    pub val: Node,
}

/// A branch node.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct FullNode {
    /// The sixteen nibble children followed by the branch's own value.
    pub children: [Option<Node>; FULL_NODE_SLOTS],
}

impl Node {
    /// Creates a leaf for the remaining `key` nibbles (which should end with the terminator).
    pub fn leaf(key: impl Into<Path>, value: impl Into<Box<[u8]>>) -> Self {
        Node::Short(Box::new(ShortNode {
            key: key.into(),
            val: Node::Value(value.into()),
        }))
    }

    /// Creates an extension node pointing at `child`.
    pub fn extension(key: impl Into<Path>, child: Node) -> Self {
        Node::Short(Box::new(ShortNode {
            key: key.into(),
            val: child,
        }))
    }

    /// Creates a branch node from `(nibble, child)` pairs and an optional value.
    ///
    /// Nibbles outside `0..16` are ignored.
    pub fn branch(
        children: impl IntoIterator<Item = (u8, Node)>,
        value: Option<Box<[u8]>>,
    ) -> Self {
        let mut full = FullNode::default();
        for (nibble, child) in children {
            if let Some(slot) = full.children.get_mut(usize::from(nibble) & 0xf) {
                *slot = Some(child);
            }
        }
        if let Some(slot) = full.children.last_mut() {
            *slot = value.map(Node::Value);
        }
        Node::Full(Box::new(full))
    }

    /// Invokes `on_child` for every hash reference inside this node, descending
    /// into embedded nodes. Values never yield children.
    pub fn for_each_child_hash(&self, on_child: &mut impl FnMut(TrieHash)) {
        match self {
            Node::Short(short) => short.val.for_each_child_hash(on_child),
            Node::Full(full) => {
                for child in full.children.iter().take(FULL_NODE_SLOTS - 1).flatten() {
                    child.for_each_child_hash(on_child);
                }
            }
            Node::Hash(hash) => on_child(*hash),
            Node::Value(_) => {}
        }
    }

    /// Collects the hash references of this node.
    pub fn child_hashes(&self) -> SmallVec<[TrieHash; 16]> {
        let mut hashes = SmallVec::new();
        self.for_each_child_hash(&mut |hash| hashes.push(hash));
        hashes
    }
}
