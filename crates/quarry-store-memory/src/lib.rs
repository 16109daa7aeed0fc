#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **quarry-store-memory** – In-memory persistence drivers for Quarry.
//!
//! Fast, non-durable implementations of [`ContentStore`] and [`RefStore`]
//! suitable for tests, transient databases and the REPL's scratch mode. All
//! data is lost when the process terminates.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use tracing::trace;

use quarry_store_core::{content_hash, ContentStore, Hash, RefStore};
use quarry_types::{canonicalize, parse_canonical, Error, Result, Value};

//─────────────────────────────
//  Content store
//─────────────────────────────

/// In-memory content-addressed blob store.
///
/// Blobs are deduplicated by hash; `put` of an already-stored value is a
/// lookup plus nothing.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    blobs: HashMap<Hash, Vec<u8>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unique blobs held.
    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }
}

impl ContentStore for MemoryStore {
    fn put(&mut self, value: &Value) -> Result<Hash> {
        let bytes = canonicalize(value)?;
        let hash = quarry_store_core::hash_bytes(&bytes);
        self.blobs.entry(hash.clone()).or_insert(bytes);
        trace!(%hash, "memory store put");
        Ok(hash)
    }

    fn get(&self, hash: &str) -> Result<Value> {
        let bytes = self
            .blobs
            .get(hash)
            .ok_or_else(|| Error::ObjectNotFound(hash.to_string()))?;
        parse_canonical(bytes)
    }

    fn has(&self, hash: &str) -> Result<bool> {
        Ok(self.blobs.contains_key(hash))
    }

    fn dump(&self) -> Result<HashMap<Hash, Vec<u8>>> {
        Ok(self.blobs.clone())
    }

    fn load(&mut self, blobs: HashMap<Hash, Vec<u8>>) -> Result<()> {
        self.blobs = blobs;
        Ok(())
    }
}

//─────────────────────────────
//  Ref namespace
//─────────────────────────────

/// In-memory ref namespace.
///
/// A `BTreeMap` keeps names sorted, so prefix listing is a range scan and
/// comes back ordered without an extra sort.
#[derive(Debug, Default, Clone)]
pub struct MemoryRefs {
    refs: BTreeMap<String, Hash>,
}

impl MemoryRefs {
    /// Create an empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live refs.
    pub fn ref_count(&self) -> usize {
        self.refs.len()
    }
}

impl RefStore for MemoryRefs {
    fn set(&mut self, name: &str, hash: &str) -> Result<()> {
        trace!(name, hash, "memory refs set");
        self.refs.insert(name.to_string(), hash.to_string());
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<Hash>> {
        Ok(self.refs.get(name).cloned())
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        trace!(name, "memory refs delete");
        self.refs.remove(name);
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let names = self
            .refs
            .range::<String, _>((Bound::Included(prefix.to_string()), Bound::Unbounded))
            .map(|(name, _)| name)
            .take_while(|name| name.starts_with(prefix))
            .cloned()
            .collect();
        Ok(names)
    }

    fn dump(&self) -> Result<BTreeMap<String, Hash>> {
        Ok(self.refs.clone())
    }

    fn load(&mut self, refs: BTreeMap<String, Hash>) -> Result<()> {
        self.refs = refs;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_store_core::snapshot;

    #[test]
    fn put_get_round_trip() {
        let mut store = MemoryStore::new();
        let v = Value::List(vec![Value::Int(1), Value::Text("two".into())]);
        let h = store.put(&v).unwrap();
        assert_eq!(h, content_hash(&v).unwrap());
        assert_eq!(store.get(&h).unwrap(), v);
        assert!(store.has(&h).unwrap());
    }

    #[test]
    fn put_is_idempotent() {
        let mut store = MemoryStore::new();
        let v = Value::Text("dup".into());
        let h1 = store.put(&v).unwrap();
        let h2 = store.put(&v).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(store.blob_count(), 1);
    }

    #[test]
    fn missing_blob_is_object_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(store.get("00"), Err(Error::ObjectNotFound(_))));
    }

    #[test]
    fn list_handles_partial_segment_prefixes() {
        let mut refs = MemoryRefs::new();
        refs.set("db/tables/users/schema", "a").unwrap();
        refs.set("db/tables/users/rows/1", "b").unwrap();
        refs.set("db/tables/orders/schema", "c").unwrap();
        refs.set("db/views/v1", "d").unwrap();

        let all = refs.list("db/tab").unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|n| n.starts_with("db/tables/")));

        let rows = refs.list("db/tables/users/rows/").unwrap();
        assert_eq!(rows, vec!["db/tables/users/rows/1".to_string()]);
    }

    #[test]
    fn list_is_sorted() {
        let mut refs = MemoryRefs::new();
        refs.set("z", "1").unwrap();
        refs.set("a", "2").unwrap();
        refs.set("m", "3").unwrap();
        assert_eq!(refs.list("").unwrap(), vec!["a", "m", "z"]);
    }

    #[test]
    fn set_is_idempotent() {
        let mut refs = MemoryRefs::new();
        refs.set("n", "h").unwrap();
        let before = refs.dump().unwrap();
        refs.set("n", "h").unwrap();
        assert_eq!(refs.dump().unwrap(), before);
        assert_eq!(refs.get("n").unwrap().as_deref(), Some("h"));
    }

    #[test]
    fn snapshot_round_trip_restores_byte_identical_state() {
        let mut store = MemoryStore::new();
        let mut refs = MemoryRefs::new();
        let h = store.put(&Value::Int(7)).unwrap();
        refs.set("db/x", &h).unwrap();

        let snap = snapshot(&store, &refs).unwrap();

        store.put(&Value::Int(8)).unwrap();
        refs.set("db/y", "ffff").unwrap();
        refs.delete("db/x").unwrap();

        quarry_store_core::restore(&mut store, &mut refs, snap.clone()).unwrap();
        assert_eq!(store.dump().unwrap(), snap.blobs);
        assert_eq!(refs.dump().unwrap(), snap.refs);
    }
}
