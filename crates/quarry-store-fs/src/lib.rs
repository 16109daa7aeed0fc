#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **quarry-store-fs** – File-backed persistence drivers for Quarry.
//!
//! Durable implementations of [`ContentStore`] and [`RefStore`] over a plain
//! directory tree:
//!
//! ```text
//! <root>/store/<hash[0:2]>/<hash[2:]>   blob bytes (canonical form)
//! <root>/refs/<name>                    hex hash as text, name is a path
//! ```
//!
//! Every write lands in a temp file in the destination directory and is
//! renamed into place, so a reader never observes a half-written blob or
//! ref. Deleting a ref removes emptied parent directories up to the refs
//! root.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use quarry_store_core::{ContentStore, Hash, RefStore};
use quarry_types::{canonicalize, parse_canonical, Error, Result, Value};

//─────────────────────────────
//  Content store
//─────────────────────────────

/// File-backed content-addressed blob store.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `<root>/store`.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().join("store");
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "opened file store");
        Ok(Self { root })
    }

    fn blob_path(&self, hash: &str) -> PathBuf {
        // Two-character fan-out keeps directories small.
        let (head, tail) = hash.split_at(2.min(hash.len()));
        self.root.join(head).join(tail)
    }
}

impl ContentStore for FileStore {
    fn put(&mut self, value: &Value) -> Result<Hash> {
        let bytes = canonicalize(value)?;
        let hash = quarry_store_core::hash_bytes(&bytes);
        let path = self.blob_path(&hash);
        if !path.exists() {
            write_atomic(&path, &bytes)?;
            trace!(%hash, "file store put");
        }
        Ok(hash)
    }

    fn get(&self, hash: &str) -> Result<Value> {
        let path = self.blob_path(hash);
        let bytes = fs::read(&path).map_err(|_| Error::ObjectNotFound(hash.to_string()))?;
        parse_canonical(&bytes)
    }

    fn has(&self, hash: &str) -> Result<bool> {
        Ok(self.blob_path(hash).exists())
    }

    fn dump(&self) -> Result<HashMap<Hash, Vec<u8>>> {
        let mut blobs = HashMap::new();
        if !self.root.exists() {
            return Ok(blobs);
        }
        for fan in fs::read_dir(&self.root)? {
            let fan = fan?;
            if !fan.file_type()?.is_dir() {
                continue;
            }
            let head = fan.file_name().to_string_lossy().into_owned();
            for entry in fs::read_dir(fan.path())? {
                let entry = entry?;
                let tail = entry.file_name().to_string_lossy().into_owned();
                blobs.insert(format!("{head}{tail}"), fs::read(entry.path())?);
            }
        }
        Ok(blobs)
    }

    fn load(&mut self, blobs: HashMap<Hash, Vec<u8>>) -> Result<()> {
        // Restore is byte-identical replacement: clear, then rewrite.
        if self.root.exists() {
            fs::remove_dir_all(&self.root)?;
        }
        fs::create_dir_all(&self.root)?;
        for (hash, bytes) in blobs {
            write_atomic(&self.blob_path(&hash), &bytes)?;
        }
        Ok(())
    }
}

//─────────────────────────────
//  Ref namespace
//─────────────────────────────

/// File-backed ref namespace.
///
/// A ref name maps directly onto a relative file path under `<root>/refs`;
/// the file content is the hex hash.
#[derive(Debug)]
pub struct FileRefs {
    root: PathBuf,
}

impl FileRefs {
    /// Open (creating if needed) a namespace rooted at `<root>/refs`.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().join("refs");
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "opened file refs");
        Ok(Self { root })
    }

    fn ref_path(&self, name: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in name.split('/') {
            path.push(segment);
        }
        path
    }

    fn collect(&self, dir: &Path, joined: &str, out: &mut Vec<String>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let segment = entry.file_name().to_string_lossy().into_owned();
            let name = if joined.is_empty() {
                segment
            } else {
                format!("{joined}/{segment}")
            };
            if entry.file_type()?.is_dir() {
                self.collect(&entry.path(), &name, out)?;
            } else {
                out.push(name);
            }
        }
        Ok(())
    }
}

impl RefStore for FileRefs {
    fn set(&mut self, name: &str, hash: &str) -> Result<()> {
        trace!(name, hash, "file refs set");
        write_atomic(&self.ref_path(name), hash.as_bytes())
    }

    fn get(&self, name: &str) -> Result<Option<Hash>> {
        match fs::read_to_string(self.ref_path(name)) {
            Ok(hash) => Ok(Some(hash.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        let path = self.ref_path(name);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        trace!(name, "file refs delete");
        // Prune emptied parent directories back up to the namespace root.
        let mut dir = path.parent().map(Path::to_path_buf);
        while let Some(d) = dir {
            if d == self.root || fs::remove_dir(&d).is_err() {
                break;
            }
            dir = d.parent().map(Path::to_path_buf);
        }
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        self.collect(&self.root, "", &mut names)?;
        names.retain(|n| n.starts_with(prefix));
        names.sort();
        Ok(names)
    }

    fn dump(&self) -> Result<BTreeMap<String, Hash>> {
        let mut refs = BTreeMap::new();
        for name in self.list("")? {
            if let Some(hash) = self.get(&name)? {
                refs.insert(name, hash);
            }
        }
        Ok(refs)
    }

    fn load(&mut self, refs: BTreeMap<String, Hash>) -> Result<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)?;
        }
        fs::create_dir_all(&self.root)?;
        for (name, hash) in refs {
            write_atomic(&self.ref_path(&name), hash.as_bytes())?;
        }
        Ok(())
    }
}

//─────────────────────────────
//  Atomic write
//─────────────────────────────

/// Write via temp-file-and-rename in the destination directory.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::Io(std::io::Error::other("path has no parent")))?;
    fs::create_dir_all(dir)?;
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Io(std::io::Error::other("path has no file name")))?;
    let tmp = dir.join(format!(".{}.tmp", file_name.to_string_lossy()));
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_layout_and_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        let v = Value::Text("persist me".into());
        let h = store.put(&v).unwrap();

        let expected = dir.path().join("store").join(&h[..2]).join(&h[2..]);
        assert!(expected.exists());
        assert_eq!(store.get(&h).unwrap(), v);
    }

    #[test]
    fn refs_round_trip_and_prefix_listing() {
        let dir = tempfile::tempdir().unwrap();
        let mut refs = FileRefs::open(dir.path()).unwrap();
        refs.set("db/tables/users/schema", "aa").unwrap();
        refs.set("db/tables/users/rows/1", "bb").unwrap();
        refs.set("db/views/v", "cc").unwrap();

        assert_eq!(refs.get("db/tables/users/schema").unwrap().as_deref(), Some("aa"));
        let listed = refs.list("db/tab").unwrap();
        assert_eq!(
            listed,
            vec![
                "db/tables/users/rows/1".to_string(),
                "db/tables/users/schema".to_string(),
            ]
        );
    }

    #[test]
    fn delete_prunes_empty_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut refs = FileRefs::open(dir.path()).unwrap();
        refs.set("db/tables/users/rows/1", "aa").unwrap();
        refs.delete("db/tables/users/rows/1").unwrap();
        assert!(refs.get("db/tables/users/rows/1").unwrap().is_none());
        assert!(!dir.path().join("refs/db").exists());
        // Deleting an absent ref is a no-op, not an error.
        refs.delete("db/tables/users/rows/1").unwrap();
    }

    #[test]
    fn reopen_sees_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let h;
        {
            let mut store = FileStore::open(dir.path()).unwrap();
            let mut refs = FileRefs::open(dir.path()).unwrap();
            h = store.put(&Value::Int(42)).unwrap();
            refs.set("db/x", &h).unwrap();
        }
        let store = FileStore::open(dir.path()).unwrap();
        let refs = FileRefs::open(dir.path()).unwrap();
        assert_eq!(store.get(&h).unwrap(), Value::Int(42));
        assert_eq!(refs.get("db/x").unwrap(), Some(h));
    }

    #[test]
    fn dump_and_load_restore_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        let mut refs = FileRefs::open(dir.path()).unwrap();
        let h = store.put(&Value::Int(1)).unwrap();
        refs.set("a/b", &h).unwrap();

        let snap = quarry_store_core::snapshot(&store, &refs).unwrap();
        store.put(&Value::Int(2)).unwrap();
        refs.set("a/c", "dead").unwrap();

        quarry_store_core::restore(&mut store, &mut refs, snap.clone()).unwrap();
        assert_eq!(store.dump().unwrap(), snap.blobs);
        assert_eq!(refs.dump().unwrap(), snap.refs);
    }
}
