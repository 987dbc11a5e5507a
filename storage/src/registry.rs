// Copyright (C) 2025, Ava Labs, Inc. All rights reserved.
// See the file LICENSE.md for licensing terms.

//! Storage layer metric definitions.

use metrics::describe_counter;

/// Number of key-value reads.
pub const KV_READ: &str = "kv.read";
/// Number of key-value reads that found nothing.
pub const KV_READ_MISS: &str = "kv.read_miss";
/// Number of batches written.
pub const BATCH_WRITE: &str = "kv.batch_write";
/// Number of operations applied by batch writes.
pub const BATCH_OPS: &str = "kv.batch_ops";
/// Bytes written by batch writes.
pub const BATCH_BYTES: &str = "kv.batch_bytes";

/// Registers all storage metric descriptions.
pub fn register() {
    describe_counter!(KV_READ, "Number of key-value reads");
    describe_counter!(KV_READ_MISS, "Number of key-value reads that found nothing");

    describe_counter!(BATCH_WRITE, "Number of batches written");
    describe_counter!(BATCH_OPS, "Number of operations applied by batch writes");
    describe_counter!(BATCH_BYTES, "Bytes written by batch writes");
}
