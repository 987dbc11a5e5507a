// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

// Ethereum compatible node encoding.

use rlp::{Rlp, RlpStream};

use crate::{FULL_NODE_SLOTS, FullNode, HASH_LENGTH, InvalidTrieHashLength, Node, Path, ShortNode};

/// Errors produced while decoding an encoded trie node.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// The underlying rlp was malformed
    #[error("malformed rlp: {0}")]
    Rlp(#[from] rlp::DecoderError),
    /// A node must be an rlp list
    #[error("expected an rlp list, found a byte string")]
    NotAList,
    /// Only short (2 items) and full (17 items) nodes exist
    #[error("invalid number of list items: {0}")]
    InvalidItemCount(usize),
    /// Nodes whose encoding reaches the hash length must be referenced by hash
    #[error("oversized embedded node ({0} bytes)")]
    OversizedEmbeddedNode(usize),
    /// A child reference was a byte string of the wrong length
    #[error(transparent)]
    InvalidHash(#[from] InvalidTrieHashLength),
    /// An extension node with an empty child reference
    #[error("extension node has no child")]
    MissingChild,
}

/// Encode `node` into its canonical on-disk form.
#[must_use]
pub fn encode(node: &Node) -> Vec<u8> {
    let mut stream = RlpStream::new();
    append_node(&mut stream, node);
    stream.out().to_vec()
}

fn append_node(stream: &mut RlpStream, node: &Node) {
    match node {
        Node::Short(short) => {
            stream.begin_list(2);
            stream.append(&short.key.to_compact().as_slice());
            append_node(stream, &short.val);
        }
        Node::Full(full) => {
            stream.begin_list(FULL_NODE_SLOTS);
            for child in &full.children {
                match child {
                    Some(child) => append_node(stream, child),
                    None => {
                        stream.append_empty_data();
                    }
                }
            }
        }
        Node::Hash(hash) => {
            stream.append(&hash.as_ref());
        }
        Node::Value(value) => {
            stream.append(&&**value);
        }
    }
}

/// Decode an encoded trie node.
///
/// # Errors
///
/// Returns a [`DecodeError`] if `buf` is not the encoding of a short or full node.
pub fn decode(buf: &[u8]) -> Result<Node, DecodeError> {
    decode_node(&Rlp::new(buf))
}

fn decode_node(rlp: &Rlp<'_>) -> Result<Node, DecodeError> {
    if !rlp.is_list() {
        return Err(DecodeError::NotAList);
    }
    match rlp.item_count()? {
        2 => decode_short(rlp),
        FULL_NODE_SLOTS => decode_full(rlp),
        count => Err(DecodeError::InvalidItemCount(count)),
    }
}

fn decode_short(rlp: &Rlp<'_>) -> Result<Node, DecodeError> {
    let key = Path::from_compact(rlp.at(0)?.data()?);
    let val = rlp.at(1)?;
    let val = if key.has_terminator() {
        Node::Value(val.data()?.into())
    } else {
        decode_ref(&val)?.ok_or(DecodeError::MissingChild)?
    };
    Ok(Node::Short(Box::new(ShortNode { key, val })))
}

fn decode_full(rlp: &Rlp<'_>) -> Result<Node, DecodeError> {
    let mut full = FullNode::default();
    for (index, slot) in full.children.iter_mut().enumerate() {
        let item = rlp.at(index)?;
        *slot = if index == FULL_NODE_SLOTS - 1 {
            let value = item.data()?;
            (!value.is_empty()).then(|| Node::Value(value.into()))
        } else {
            decode_ref(&item)?
        };
    }
    Ok(Node::Full(Box::new(full)))
}

fn decode_ref(rlp: &Rlp<'_>) -> Result<Option<Node>, DecodeError> {
    if rlp.is_list() {
        let size = rlp.as_raw().len();
        if size >= HASH_LENGTH {
            return Err(DecodeError::OversizedEmbeddedNode(size));
        }
        return decode_node(rlp).map(Some);
    }
    let data = rlp.data()?;
    if data.is_empty() {
        return Ok(None);
    }
    Ok(Some(Node::Hash(data.try_into()?)))
}
