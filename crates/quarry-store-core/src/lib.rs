#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **quarry-store-core** – Core persistence abstractions for Quarry.
//!
//! This crate defines the two persistence contracts the engine is built on:
//! an immutable, content-addressed blob store ([`ContentStore`]) and a
//! mutable name-to-hash namespace ([`RefStore`]). Concrete drivers (memory,
//! file-backed) implement these traits in separate crates that depend on
//! this core abstraction.
//!
//! Blob identity is the SHA-256 of the value's canonical serialization, so
//! two structurally equal values always share a hash and the store
//! deduplicates for free.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use quarry_types::{canonicalize, Result, Value};

//─────────────────────────────
//  Hashing
//─────────────────────────────

/// Lowercase hex SHA-256 digest of a canonical serialization.
pub type Hash = String;

/// Hash a value's canonical form.
///
/// This is the single addressing function: `put(v)` always stores under
/// `content_hash(v)`, and equality of hashes is equality of canonical bytes.
pub fn content_hash(value: &Value) -> Result<Hash> {
    Ok(hash_bytes(&canonicalize(value)?))
}

/// Hash raw canonical bytes.
pub fn hash_bytes(bytes: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

//─────────────────────────────
//  Content store trait
//─────────────────────────────

/// Immutable content-addressed blob store.
///
/// Blobs are never deleted; `put` is idempotent because the address is the
/// content. Drivers must keep the canonical bytes verbatim so a snapshot can
/// restore persistence byte-identically.
pub trait ContentStore: Send {
    /// Canonicalize, hash, store if absent, return the hash.
    fn put(&mut self, value: &Value) -> Result<Hash>;

    /// Retrieve and parse the blob for a hash.
    ///
    /// Fails with [`quarry_types::Error::ObjectNotFound`] if the hash was
    /// never stored.
    fn get(&self, hash: &str) -> Result<Value>;

    /// Whether a blob exists for the hash.
    fn has(&self, hash: &str) -> Result<bool>;

    /// Copy out every stored blob, keyed by hash. Used by snapshots.
    fn dump(&self) -> Result<HashMap<Hash, Vec<u8>>>;

    /// Replace the entire store contents. Used by snapshot restore.
    fn load(&mut self, blobs: HashMap<Hash, Vec<u8>>) -> Result<()>;
}

//─────────────────────────────
//  Ref namespace trait
//─────────────────────────────

/// Mutable mapping from slash-delimited names to blob hashes.
///
/// The namespace is flat; names do not nest. The one structural operation is
/// prefix enumeration, which must be correct even for partial-segment
/// prefixes (listing `db/tab` finds `db/tables/...`).
pub trait RefStore: Send {
    /// Point `name` at `hash`, overwriting any previous pointer.
    fn set(&mut self, name: &str, hash: &str) -> Result<()>;

    /// Current pointer for `name`, or `None`.
    fn get(&self, name: &str) -> Result<Option<Hash>>;

    /// Remove the pointer for `name`. Removing an absent name is a no-op.
    fn delete(&mut self, name: &str) -> Result<()>;

    /// Every name whose text starts with `prefix`, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Copy out the whole namespace. Used by snapshots.
    fn dump(&self) -> Result<BTreeMap<String, Hash>>;

    /// Replace the entire namespace. Used by snapshot restore.
    fn load(&mut self, refs: BTreeMap<String, Hash>) -> Result<()>;
}

//─────────────────────────────
//  Snapshot
//─────────────────────────────

/// Deep copy of the whole persistence state: blobs plus refs.
///
/// Captured at `BEGIN`, restored byte-identically at `ROLLBACK`. Opaque to
/// everything except the runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Blob bytes keyed by hash.
    pub blobs: HashMap<Hash, Vec<u8>>,
    /// Ref namespace.
    pub refs: BTreeMap<String, Hash>,
}

/// Capture a snapshot from a store/refs pair.
pub fn snapshot(store: &dyn ContentStore, refs: &dyn RefStore) -> Result<Snapshot> {
    Ok(Snapshot {
        blobs: store.dump()?,
        refs: refs.dump()?,
    })
}

/// Restore a snapshot into a store/refs pair.
pub fn restore(store: &mut dyn ContentStore, refs: &mut dyn RefStore, snap: Snapshot) -> Result<()> {
    store.load(snap.blobs)?;
    refs.load(snap.refs)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn equal_values_share_a_hash() {
        let mut a = BTreeMap::new();
        a.insert("x".to_string(), Value::Int(1));
        a.insert("y".to_string(), Value::Text("z".into()));
        let mut b = BTreeMap::new();
        b.insert("y".to_string(), Value::Text("z".into()));
        b.insert("x".to_string(), Value::Int(1));
        assert_eq!(
            content_hash(&Value::Map(a)).unwrap(),
            content_hash(&Value::Map(b)).unwrap()
        );
    }

    #[test]
    fn hash_is_hex_sha256() {
        let h = content_hash(&Value::Null).unwrap();
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
        // sha256("null")
        assert_eq!(h, hash_bytes(b"null"));
    }
}
