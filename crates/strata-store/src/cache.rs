//! Copy-on-write overlay store.
//!
//! Reads fall through to the parent unless the key was written in the overlay.
//! Writes stay in the overlay until [`CacheStore::into_writes`] hands them back
//! for the owner of the parent to apply, or the cache is dropped and they vanish.

use std::collections::BTreeMap;

use crate::{KvStore, Result, WriteBatch};

pub struct CacheStore<'p> {
    parent: &'p dyn KvStore,
    writes: WriteBatch,
}

impl<'p> CacheStore<'p> {
    pub fn new(parent: &'p dyn KvStore) -> Self {
        Self {
            parent,
            writes: WriteBatch::new(),
        }
    }

    /// Number of keys written or deleted in the overlay.
    pub fn pending(&self) -> usize {
        self.writes.len()
    }

    /// Release the parent borrow and return the pending writes.
    pub fn into_writes(self) -> WriteBatch {
        self.writes
    }
}

impl KvStore for CacheStore<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.writes.get(key) {
            Some(value) => Ok(value.clone()),
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.writes.insert(key.to_vec(), None);
        Ok(())
    }

    fn range(&self, start: &[u8], end: Option<&[u8]>) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self.parent.range(start, end)?.into_iter().collect();
        let in_range = |k: &[u8]| k >= start && end.map_or(true, |e| k < e);
        for (key, value) in self.writes.iter().filter(|(k, _)| in_range(k)) {
            match value {
                Some(v) => {
                    merged.insert(key.clone(), v.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemStore;

    #[test]
    fn test_overlay_shadows_parent() {
        let mut parent = MemStore::new();
        parent.set(b"a", b"1").expect("set");
        parent.set(b"b", b"2").expect("set");

        let mut cache = CacheStore::new(&parent);
        cache.set(b"a", b"9").expect("set");
        cache.delete(b"b").expect("delete");
        cache.set(b"c", b"3").expect("set");

        assert_eq!(cache.get(b"a").expect("get"), Some(b"9".to_vec()));
        assert!(cache.get(b"b").expect("get").is_none());
        let keys: Vec<Vec<u8>> = cache.prefix(b"").expect("all").into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"c".to_vec()]);

        // Parent untouched until the batch is applied.
        assert_eq!(parent.get(b"a").expect("get"), Some(b"1".to_vec()));
    }

    #[test]
    fn test_commit_applies_batch() {
        let mut parent = MemStore::new();
        parent.set(b"a", b"1").expect("set");

        let writes = {
            let mut cache = CacheStore::new(&parent);
            cache.delete(b"a").expect("delete");
            cache.set(b"b", b"2").expect("set");
            assert_eq!(cache.pending(), 2);
            cache.into_writes()
        };
        parent.apply(writes).expect("apply");

        assert!(parent.get(b"a").expect("get").is_none());
        assert_eq!(parent.get(b"b").expect("get"), Some(b"2".to_vec()));
    }

    #[test]
    fn test_discard_leaves_parent() {
        let mut parent = MemStore::new();
        parent.set(b"a", b"1").expect("set");
        {
            let mut cache = CacheStore::new(&parent);
            cache.delete(b"a").expect("delete");
        }
        assert_eq!(parent.len(), 1);
    }
}
