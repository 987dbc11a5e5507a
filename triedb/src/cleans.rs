// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

//! A byte-budgeted cache of encoded nodes that are already on disk.
//!
//! The cache is split into shards, each guarded by its own mutex, so it can
//! be used from the read path without holding the dirty cache lock. The
//! contents can be saved to a journal file and restored on startup.
//!
//! Journal layout: the magic bytes `TRIEJRNL`, a varint format version, then
//! one `0x01 ‖ hash ‖ varint length ‖ bytes` record per entry and a final
//! `0x00`. Records are written least recently used first.

use integer_encoding::{VarIntReader, VarIntWriter};
use lru::LruCache;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use triedb_storage::logger::{debug, warn};
use triedb_storage::{HASH_LENGTH, TrieHash};

const SHARDS: usize = 16;
const JOURNAL_MAGIC: &[u8; 8] = b"TRIEJRNL";
const JOURNAL_VERSION: u32 = 1;
const RECORD: u8 = 0x01;
const END: u8 = 0x00;

#[derive(Debug)]
struct Shard {
    entries: LruCache<TrieHash, Box<[u8]>>,
    bytes: usize,
}

impl Shard {
    fn new() -> Self {
        Self {
            entries: LruCache::unbounded(),
            bytes: 0,
        }
    }

    const fn cost(blob: &[u8]) -> usize {
        HASH_LENGTH.saturating_add(blob.len())
    }

    fn insert(&mut self, hash: TrieHash, blob: Box<[u8]>, budget: usize) {
        let cost = Self::cost(&blob);
        if cost > budget {
            return;
        }
        if let Some(old) = self.entries.put(hash, blob) {
            self.bytes = self.bytes.saturating_sub(Self::cost(&old));
        }
        self.bytes = self.bytes.saturating_add(cost);
        while self.bytes > budget {
            let Some((_, evicted)) = self.entries.pop_lru() else {
                break;
            };
            self.bytes = self.bytes.saturating_sub(Self::cost(&evicted));
        }
    }

    fn remove(&mut self, hash: &TrieHash) {
        if let Some(old) = self.entries.pop(hash) {
            self.bytes = self.bytes.saturating_sub(Self::cost(&old));
        }
    }
}

/// The clean cache.
#[derive(Debug)]
pub struct CleanCache {
    shards: [Mutex<Shard>; SHARDS],
    shard_budget: usize,
}

impl CleanCache {
    /// Creates an empty cache holding at most `max_bytes` of hashes and blobs.
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self {
            shards: std::array::from_fn(|_| Mutex::new(Shard::new())),
            shard_budget: (max_bytes / SHARDS).max(1),
        }
    }

    #[expect(
        clippy::indexing_slicing,
        reason = "the index is reduced modulo the shard count"
    )]
    fn shard(&self, hash: &TrieHash) -> &Mutex<Shard> {
        &self.shards[usize::from(hash[0]) % SHARDS]
    }

    /// Returns a copy of the blob cached under `hash`.
    pub fn get(&self, hash: &TrieHash) -> Option<Box<[u8]>> {
        self.shard(hash).lock().entries.get(hash).cloned()
    }

    /// Returns true if `hash` is cached, without touching its recency.
    pub fn contains(&self, hash: &TrieHash) -> bool {
        self.shard(hash).lock().entries.contains(hash)
    }

    /// Caches `blob` under `hash`, evicting the least recently used entries of
    /// the shard when it goes over budget.
    pub fn set(&self, hash: TrieHash, blob: impl Into<Box<[u8]>>) {
        self.shard(&hash)
            .lock()
            .insert(hash, blob.into(), self.shard_budget);
    }

    /// Drops `hash` from the cache.
    pub fn remove(&self, hash: &TrieHash) {
        self.shard(hash).lock().remove(hash);
    }

    /// The number of cached entries.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().entries.len()).sum()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The bytes accounted to cached hashes and blobs.
    pub fn size(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().bytes).sum()
    }

    /// Restores a cache from the journal at `path`, or creates an empty one if
    /// the journal is missing or unreadable.
    pub fn load_from_file_or_new(path: &Path, max_bytes: usize) -> Self {
        let cache = Self::new(max_bytes);
        match File::open(path) {
            Ok(file) => match cache.load(&mut BufReader::new(file)) {
                Ok(count) => debug!("loaded {count} clean cache entries from {}", path.display()),
                Err(err) => {
                    warn!(
                        "ignoring unreadable clean cache journal {}: {err}",
                        path.display()
                    );
                    return Self::new(max_bytes);
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("no clean cache journal at {}", path.display());
            }
            Err(err) => warn!("cannot open clean cache journal {}: {err}", path.display()),
        }
        cache
    }

    fn load(&self, reader: &mut impl Read) -> io::Result<usize> {
        let mut magic = [0u8; JOURNAL_MAGIC.len()];
        reader.read_exact(&mut magic)?;
        if &magic != JOURNAL_MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad journal magic"));
        }
        let version: u32 = reader.read_varint()?;
        if version != JOURNAL_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported journal version {version}"),
            ));
        }

        let mut count = 0usize;
        loop {
            let mut tag = [0u8; 1];
            reader.read_exact(&mut tag)?;
            match tag {
                [END] => return Ok(count),
                [RECORD] => {}
                [other] => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("unexpected journal record tag {other:#04x}"),
                    ));
                }
            }
            let mut hash = [0u8; HASH_LENGTH];
            reader.read_exact(&mut hash)?;
            let len: usize = reader.read_varint()?;
            let mut blob = Vec::new();
            reader.by_ref().take(len as u64).read_to_end(&mut blob)?;
            if blob.len() != len {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
            self.set(TrieHash::from(hash), blob);
            count = count.saturating_add(1);
        }
    }

    /// Writes the cache to the journal at `path`. The journal is written to a
    /// temporary file first and renamed into place.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from creating, writing or renaming the file.
    pub fn save_to_file(&self, path: &Path) -> io::Result<usize> {
        let tmp = path.with_extension("tmp");
        let mut writer = BufWriter::new(File::create(&tmp)?);
        let count = self.save(&mut writer)?;
        let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, path)?;
        Ok(count)
    }

    fn save(&self, writer: &mut impl Write) -> io::Result<usize> {
        writer.write_all(JOURNAL_MAGIC)?;
        writer.write_varint(JOURNAL_VERSION)?;
        let mut count = 0usize;
        for shard in &self.shards {
            let shard = shard.lock();
            for (hash, blob) in shard.entries.iter().rev() {
                writer.write_all(&[RECORD])?;
                writer.write_all(hash.as_ref())?;
                writer.write_varint(blob.len())?;
                writer.write_all(blob)?;
                count = count.saturating_add(1);
            }
        }
        writer.write_all(&[END])?;
        Ok(count)
    }
}
