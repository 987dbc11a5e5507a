// Copyright (C) 2023, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

use std::path::PathBuf;
use std::time::Duration;

use typed_builder::TypedBuilder;

/// Soft time budget of a single `dereference` call.
pub const DEREFERENCE_TIME_LIMIT: Duration = Duration::from_millis(300);

/// `reference_version` calls slower than this are logged.
pub const REFERENCE_VERSION_WARN: Duration = Duration::from_millis(400);

/// Preimages are flushed by `cap` once they exceed this many bytes.
pub const PREIMAGE_FLUSH_THRESHOLD: usize = 4 * 1024 * 1024;

/// Trie database configuration.
#[derive(Clone, Debug, TypedBuilder)]
pub struct Config {
    /// Memory allowance, in bytes, of the clean cache. Zero disables it.
    #[builder(default = 0)]
    pub clean_cache_size: usize,

    /// Journal the clean cache is restored from when the database is created.
    #[builder(default, setter(strip_option, into))]
    pub journal: Option<PathBuf>,

    /// Whether preimages of trie keys are recorded.
    #[builder(default = true)]
    pub preimages: bool,

    /// Soft time budget of a single dereference call; the remaining walk is
    /// abandoned once it is exceeded.
    #[builder(default = DEREFERENCE_TIME_LIMIT)]
    pub dereference_time_limit: Duration,

    /// `reference_version` calls slower than this are logged as warnings.
    #[builder(default = REFERENCE_VERSION_WARN)]
    pub reference_version_warn: Duration,

    /// Size above which `cap` also flushes the recorded preimages.
    #[builder(default = PREIMAGE_FLUSH_THRESHOLD)]
    pub preimage_flush_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config::builder().build()
    }
}
