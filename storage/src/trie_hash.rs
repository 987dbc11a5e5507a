// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

use std::fmt::{self, Debug, Display, Formatter};

/// The length in bytes of a [`TrieHash`].
pub const HASH_LENGTH: usize = 32;

/// A hash value inside a merkle trie.
///
/// The all-zero hash is never produced by hashing a node; the cache uses it
/// as the key of its meta-root.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Default)]
pub struct TrieHash([u8; HASH_LENGTH]);

/// An error indicating that a slice of bytes could not be converted into a [`TrieHash`]
/// because the slice was not the expected length.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not convert a slice of {0} bytes into a TrieHash")]
pub struct InvalidTrieHashLength(pub usize);

impl TrieHash {
    /// The zero hash.
    pub const ZERO: TrieHash = TrieHash([0; HASH_LENGTH]);

    /// Return the length of a `TrieHash`
    #[must_use]
    pub const fn len() -> usize {
        HASH_LENGTH
    }

    /// Returns true if this is the zero hash.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Returns the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }
}

impl std::ops::Deref for TrieHash {
    type Target = [u8; HASH_LENGTH];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for TrieHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for TrieHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Display for TrieHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl From<[u8; HASH_LENGTH]> for TrieHash {
    fn from(value: [u8; HASH_LENGTH]) -> Self {
        TrieHash(value)
    }
}

impl TryFrom<&[u8]> for TrieHash {
    type Error = InvalidTrieHashLength;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; HASH_LENGTH] = value
            .try_into()
            .map_err(|_| InvalidTrieHashLength(value.len()))?;
        Ok(TrieHash(array))
    }
}
