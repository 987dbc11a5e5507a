// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

use triedb_storage::{HASH_LENGTH, KeyValueStore, TrieHash, schema};

use crate::{Database, Error};

impl<S: KeyValueStore> Database<S> {
    /// Records the preimage of a hashed trie key. The first preimage recorded
    /// for a hash wins. Does nothing when preimage recording is disabled.
    pub fn insert_preimage(&self, hash: TrieHash, preimage: impl Into<Box<[u8]>>) {
        let mut guard = self.dirty.write();
        let state = &mut *guard;
        let Some(preimages) = &mut state.preimages else {
            return;
        };
        if preimages.contains_key(&hash) {
            return;
        }
        let preimage = preimage.into();
        state.preimages_size = state
            .preimages_size
            .saturating_add(HASH_LENGTH.saturating_add(preimage.len()));
        preimages.insert(hash, preimage);
    }

    /// Returns the preimage of `hash`, from memory or disk. Always `None`
    /// when preimage recording is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disk`] if the store fails.
    pub fn preimage(&self, hash: &TrieHash) -> Result<Option<Box<[u8]>>, Error> {
        {
            let state = self.dirty.read();
            let Some(preimages) = &state.preimages else {
                return Ok(None);
            };
            if let Some(preimage) = preimages.get(hash) {
                return Ok(Some(preimage.clone()));
            }
        }
        Ok(schema::read_preimage(&self.disk, hash)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Config;
    use triedb_storage::MemoryDb;

    #[test]
    fn first_writer_wins() {
        let db = Database::new(MemoryDb::new());
        let hash = TrieHash::from([1; 32]);
        db.insert_preimage(hash, &b"first"[..]);
        db.insert_preimage(hash, &b"second"[..]);

        assert_eq!(db.preimage(&hash).unwrap().as_deref(), Some(&b"first"[..]));
        assert_eq!(db.size().1, HASH_LENGTH + 5);
    }

    #[test]
    fn disabled_preimages_are_ignored() {
        let config = Config::builder().preimages(false).build();
        let db = Database::with_config(MemoryDb::new(), config);
        let hash = TrieHash::from([1; 32]);
        db.insert_preimage(hash, &b"key"[..]);

        assert_eq!(db.size().1, 0);
        assert_eq!(db.preimage(&hash).unwrap(), None);
    }

    #[test]
    fn falls_back_to_disk() {
        let disk = MemoryDb::new();
        let hash = TrieHash::from([2; 32]);
        disk.put(&schema::preimage_key(&hash), b"stored").unwrap();

        let db = Database::new(disk);
        assert_eq!(db.preimage(&hash).unwrap().as_deref(), Some(&b"stored"[..]));
        assert_eq!(db.preimage(&TrieHash::from([3; 32])).unwrap(), None);
    }
}
