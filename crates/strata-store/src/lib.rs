//! # strata-store
//!
//! Key-value storage layer for the distribution ledger.
//!
//! Keys and values are opaque byte strings; keys iterate in lexicographic order.
//!
//! ## Modules
//!
//! - [`memory`]: `BTreeMap`-backed store for tests and simulation
//! - [`sqlite`]: persistent store on a single SQLite table
//! - [`cache`]: copy-on-write overlay over any store, committed or discarded as a unit
//! - [`codec`]: CBOR encoding of ledger records
//! - [`schema`], [`migrations`]: SQLite schema and `PRAGMA user_version` migrations

pub mod cache;
pub mod codec;
pub mod memory;
pub mod migrations;
pub mod schema;
pub mod sqlite;

use std::collections::BTreeMap;

pub use cache::CacheStore;
pub use memory::MemStore;
pub use sqlite::SqliteStore;

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Storage error types.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Pending writes keyed by store key: `Some(value)` sets, `None` deletes.
pub type WriteBatch = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// Ordered key-value store.
pub trait KvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// All entries with `start <= key < end` in ascending key order. `end = None`
    /// means unbounded.
    fn range(&self, start: &[u8], end: Option<&[u8]>) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// All entries whose key starts with `prefix`.
    fn prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let end = prefix_end(prefix);
        self.range(prefix, end.as_deref())
    }

    /// Apply a batch of writes.
    fn apply(&mut self, batch: WriteBatch) -> Result<()> {
        for (key, value) in batch {
            match value {
                Some(v) => self.set(&key, &v)?,
                None => self.delete(&key)?,
            }
        }
        Ok(())
    }
}

/// Smallest key greater than every key with the given prefix, or `None` if the
/// prefix is empty or all `0xFF`.
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xFF {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_end() {
        assert_eq!(prefix_end(&[0x01, 0x02]), Some(vec![0x01, 0x03]));
        assert_eq!(prefix_end(&[0x01, 0xFF]), Some(vec![0x02]));
        assert_eq!(prefix_end(&[0xFF, 0xFF]), None);
        assert_eq!(prefix_end(&[]), None);
    }
}
