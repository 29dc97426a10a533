//! Typed key/value database on disk.
//!
//! A thin front end over a sled tree. Every database carries a fixed-length
//! type tag under the reserved key `"dbtype"`; opening a database whose tag
//! does not match fails loudly, which is the versioning mechanism against
//! record-schema drift.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;

/// Reserved key holding the type tag.
const DBTYPE_KEY: &[u8] = b"dbtype";

/// Fixed length of the stored type tag.
const TAG_LENGTH: usize = 32;

/// A typed, tag-checked key/value store over sled.
pub struct DiskDb<T> {
    db: sled::Db,
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

/// Null-pad a tag string to its fixed stored length.
fn tag_bytes(tag: &str) -> [u8; TAG_LENGTH] {
    let mut bytes = [0u8; TAG_LENGTH];
    let src = tag.as_bytes();
    let n = src.len().min(TAG_LENGTH - 1);
    bytes[..n].copy_from_slice(&src[..n]);
    bytes
}

/// Recover the tag string from its stored form.
fn tag_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

impl<T: Serialize + DeserializeOwned> DiskDb<T> {
    /// Open a database, creating it if necessary, and validate its type tag.
    pub fn open(path: &Path, tag: &str) -> Result<DiskDb<T>, StoreError> {
        let db = sled::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let expected = tag_bytes(tag);
        match db.get(DBTYPE_KEY)? {
            Some(found) if found.as_ref() != expected.as_slice() => {
                return Err(StoreError::TypeMismatch {
                    expected: tag.to_string(),
                    found: tag_string(&found),
                });
            }
            Some(_) => {}
            None => {
                db.insert(DBTYPE_KEY, expected.to_vec())?;
            }
        }
        Ok(DiskDb {
            db,
            path: path.to_path_buf(),
            _marker: PhantomData,
        })
    }

    /// The path this database was opened at.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a record exists under the given hash.
    pub fn exists(&self, hash: u64) -> Result<bool, StoreError> {
        Ok(self.db.contains_key(hash.to_be_bytes())?)
    }

    /// Read the record stored under the given hash.
    pub fn get(&self, hash: u64) -> Result<Option<T>, StoreError> {
        match self.db.get(hash.to_be_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Write a record under the given hash, replacing any previous one.
    pub fn put(&self, hash: u64, data: &T) -> Result<(), StoreError> {
        let bytes = bincode::serialize(data)?;
        self.db.insert(hash.to_be_bytes(), bytes)?;
        Ok(())
    }

    /// Force buffered writes to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    /// Number of stored records, excluding the type tag.
    pub fn len(&self) -> usize {
        self.db.len().saturating_sub(1)
    }

    /// Whether the database holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot the database to a sibling path.
    ///
    /// Flushes, then exports into a fresh tree at `dest`, replacing whatever
    /// was there.
    pub fn backup_to(&self, dest: &Path) -> Result<(), StoreError> {
        self.db.flush()?;
        if dest.exists() {
            std::fs::remove_dir_all(dest)?;
        }
        let out = sled::open(dest).map_err(|source| StoreError::Open {
            path: dest.to_path_buf(),
            source,
        })?;
        out.import(self.db.export());
        out.flush()?;
        Ok(())
    }
}

impl<T> std::fmt::Debug for DiskDb<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskDb").field("path", &self.path).finish()
    }
}
