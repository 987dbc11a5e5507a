// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

use bitflags::bitflags;
use smallvec::SmallVec;
use std::fmt::{self, Debug};
use std::iter::once;

/// The nibble that terminates the path of a node carrying a value.
pub const TERMINATOR: u8 = 16;

/// Path is part or all of a node's path in the trie.
/// Each element is a nibble; a trailing [`TERMINATOR`] marks a leaf path.
#[derive(PartialEq, Eq, Clone, Default)]
pub struct Path(pub SmallVec<[u8; 64]>);

impl Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        for nib in &self.0 {
            match *nib {
                TERMINATOR => write!(f, "T")?,
                n if n > 0xf => write!(f, "[invalid {n:02x}] ")?,
                n => write!(f, "{n:x} ")?,
            }
        }
        Ok(())
    }
}

impl std::ops::Deref for Path {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl<T: AsRef<[u8]>> From<T> for Path {
    fn from(value: T) -> Self {
        Self(SmallVec::from_slice(value.as_ref()))
    }
}

bitflags! {
    // stored in the high nibble of the first compact byte
    struct Flags: u8 {
        const ODD_LEN    = 0b0001;
        const TERMINATOR = 0b0010;
    }
}

impl Path {
    /// Creates a leaf path from raw key bytes: two nibbles per byte, then the terminator.
    pub fn from_key_bytes(key: &[u8]) -> Self {
        Path(
            key.iter()
                .flat_map(|b| [b >> 4, b & 0xf])
                .chain(once(TERMINATOR))
                .collect(),
        )
    }

    /// Returns true if this path ends with the [`TERMINATOR`] nibble.
    #[must_use]
    pub fn has_terminator(&self) -> bool {
        self.0.last() == Some(&TERMINATOR)
    }

    /// Return the hex-prefix ("compact") encoding of this path, which is how
    /// short nodes store their key on disk.
    #[must_use]
    pub fn to_compact(&self) -> Vec<u8> {
        let mut flags = Flags::empty();
        let nibbles = if self.has_terminator() {
            flags.insert(Flags::TERMINATOR);
            self.0.get(..self.0.len().saturating_sub(1)).unwrap_or_default()
        } else {
            self.0.as_slice()
        };

        let mut out = Vec::with_capacity(nibbles.len() / 2 + 1);
        let rest = if nibbles.len() & 1 == 1 {
            flags.insert(Flags::ODD_LEN);
            let (first, rest) = nibbles.split_first().map_or((0, nibbles), |(f, r)| (*f, r));
            out.push((flags.bits() << 4) | first);
            rest
        } else {
            out.push(flags.bits() << 4);
            nibbles
        };
        out.extend(rest.chunks(2).map(|pair| match pair {
            [hi, lo] => (hi << 4) | lo,
            [hi] => hi << 4,
            _ => 0,
        }));
        out
    }

    /// Decode a hex-prefix ("compact") encoded key back into nibbles.
    pub fn from_compact(compact: &[u8]) -> Self {
        let Some((&first, rest)) = compact.split_first() else {
            return Path::default();
        };
        let flags = Flags::from_bits_truncate(first >> 4);

        let mut nibbles = SmallVec::with_capacity(rest.len() * 2 + 2);
        if flags.contains(Flags::ODD_LEN) {
            nibbles.push(first & 0xf);
        }
        nibbles.extend(rest.iter().flat_map(|b| [b >> 4, b & 0xf]));
        if flags.contains(Flags::TERMINATOR) {
            nibbles.push(TERMINATOR);
        }
        Path(nibbles)
    }
}
