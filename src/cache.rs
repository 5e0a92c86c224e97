//! File-backed job cache.
//!
//! Each [`Slot`] is one JSON document in the cache directory. A slot is
//! either filled with the last value `put` into it or holds the empty
//! marker `null` written by `clear`. Slots are independent; there is no
//! transaction spanning more than one of them. Callers that need one hold
//! the directory-wide [`CacheLock`] across their reads and writes.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::PathBuf;

use fs4::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

const EMPTY_MARKER: &[u8] = b"null";
const LOCK_FILE: &str = ".lock";

/// Named slots of the job cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    FetchedItems,
    JobMeta,
    Readings,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::FetchedItems, Slot::JobMeta, Slot::Readings];

    pub fn name(self) -> &'static str {
        match self {
            Slot::FetchedItems => "fetched-items",
            Slot::JobMeta => "job-meta",
            Slot::Readings => "readings",
        }
    }

    fn file_name(self) -> String {
        format!("{}.json", self.name())
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache slot {slot} is empty")]
    Empty { slot: Slot },

    #[error("cache slot {slot} holds malformed data: {source}")]
    Decode {
        slot: Slot,
        #[source]
        source: serde_json::Error,
    },

    #[error("cache slot {slot} I/O failure: {source}")]
    Io {
        slot: Slot,
        #[source]
        source: io::Error,
    },

    #[error("cannot lock cache {}: {source}", .path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Exclusive hold on a cache directory, shared by every process using it.
/// Released on drop.
#[derive(Debug)]
pub struct CacheLock {
    file: File,
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Durable store of the in-flight job, one file per [`Slot`].
#[derive(Debug, Clone)]
pub struct JobCache {
    dir: PathBuf,
}

impl JobCache {
    /// Opens the cache rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    #[cfg(test)]
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    /// Takes the directory-wide lock if nobody else holds it.
    ///
    /// Returns `Ok(None)` while another handle, in this process or another,
    /// holds the lock.
    pub fn try_lock(&self) -> Result<Option<CacheLock>, CacheError> {
        let path = self.dir.join(LOCK_FILE);
        let file = match OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(source) => return Err(CacheError::Lock { path, source }),
        };
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(CacheLock { file })),
            Err(e) if e.kind() == fs4::lock_contended_error().kind() => Ok(None),
            Err(source) => Err(CacheError::Lock { path, source }),
        }
    }

    fn path(&self, slot: Slot) -> PathBuf {
        self.dir.join(slot.file_name())
    }

    /// Replaces the content of `slot`.
    ///
    /// The value is written to a temporary sibling and renamed into place,
    /// so readers see either the previous document or the new one.
    pub fn put<T: Serialize + ?Sized>(&self, slot: Slot, value: &T) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|source| CacheError::Decode { slot, source })?;
        self.write_atomic(slot, &bytes)?;
        debug!(slot = %slot, bytes = bytes.len(), "cache slot written");
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, slot: Slot) -> Result<T, CacheError> {
        let bytes = self.read(slot)?.ok_or(CacheError::Empty { slot })?;
        serde_json::from_slice(&bytes).map_err(|source| CacheError::Decode { slot, source })
    }

    /// Resets `slot` to the empty marker. Clearing an empty slot is a no-op.
    pub fn clear(&self, slot: Slot) -> Result<(), CacheError> {
        self.write_atomic(slot, EMPTY_MARKER)?;
        debug!(slot = %slot, "cache slot cleared");
        Ok(())
    }

    /// Clears every slot, job items first. A failure part way leaves a slot
    /// combination that no stage accepts.
    pub fn clear_all(&self) -> Result<(), CacheError> {
        for slot in Slot::ALL {
            self.clear(slot)?;
        }
        Ok(())
    }

    /// Whether `slot` currently holds a value. Content is not decoded.
    pub fn is_filled(&self, slot: Slot) -> Result<bool, CacheError> {
        Ok(self.read(slot)?.is_some())
    }

    // Returns `None` for a missing file or one holding only the empty marker.
    fn read(&self, slot: Slot) -> Result<Option<Vec<u8>>, CacheError> {
        let bytes = match fs::read(self.path(slot)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { slot, source }),
        };
        let trimmed = bytes.trim_ascii();
        if trimmed.is_empty() || trimmed == EMPTY_MARKER {
            Ok(None)
        } else {
            Ok(Some(bytes))
        }
    }

    fn write_atomic(&self, slot: Slot, bytes: &[u8]) -> Result<(), CacheError> {
        let target = self.path(slot);
        let tmp = self.dir.join(format!(".{}.tmp", slot.file_name()));
        fs::write(&tmp, bytes)
            .and_then(|()| fs::rename(&tmp, &target))
            .map_err(|source| {
                let _ = fs::remove_file(&tmp);
                CacheError::Io { slot, source }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn cache() -> (tempfile::TempDir, JobCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = JobCache::open(dir.path().join("cache")).unwrap();
        (dir, cache)
    }

    #[test]
    fn put_then_get_returns_last_value() {
        let (_dir, cache) = cache();
        cache.put(Slot::JobMeta, &json!({"job_num": "J1"})).unwrap();
        cache.put(Slot::JobMeta, &json!({"job_num": "J2"})).unwrap();

        let value: Value = cache.get(Slot::JobMeta).unwrap();
        assert_eq!(value, json!({"job_num": "J2"}));
    }

    #[test]
    fn missing_slot_reads_as_empty() {
        let (_dir, cache) = cache();
        let err = cache.get::<Value>(Slot::Readings).unwrap_err();
        assert!(matches!(err, CacheError::Empty { slot: Slot::Readings }));
        assert!(!cache.is_filled(Slot::Readings).unwrap());
    }

    #[test]
    fn clear_is_idempotent() {
        let (_dir, cache) = cache();
        cache.clear(Slot::FetchedItems).unwrap();
        cache.clear(Slot::FetchedItems).unwrap();

        let err = cache.get::<Value>(Slot::FetchedItems).unwrap_err();
        assert!(matches!(err, CacheError::Empty { .. }));
        assert_eq!(
            fs::read(cache.dir().join("fetched-items.json")).unwrap(),
            b"null"
        );
    }

    #[test]
    fn clear_after_put_empties_slot() {
        let (_dir, cache) = cache();
        cache.put(Slot::Readings, &json!([1, 2, 3])).unwrap();
        assert!(cache.is_filled(Slot::Readings).unwrap());

        cache.clear(Slot::Readings).unwrap();
        assert!(!cache.is_filled(Slot::Readings).unwrap());
    }

    #[test]
    fn malformed_content_is_a_decode_error() {
        let (_dir, cache) = cache();
        fs::write(cache.dir().join("job-meta.json"), b"{not json").unwrap();

        let err = cache.get::<Value>(Slot::JobMeta).unwrap_err();
        assert!(matches!(err, CacheError::Decode { slot: Slot::JobMeta, .. }));
        // Presence is judged without decoding.
        assert!(cache.is_filled(Slot::JobMeta).unwrap());
    }

    #[test]
    fn wrong_shape_is_a_decode_error() {
        let (_dir, cache) = cache();
        cache.put(Slot::Readings, &json!({"not": "a list"})).unwrap();

        let err = cache.get::<Vec<u32>>(Slot::Readings).unwrap_err();
        assert!(matches!(err, CacheError::Decode { .. }));
    }

    #[test]
    fn clear_all_empties_every_slot() {
        let (_dir, cache) = cache();
        for slot in Slot::ALL {
            cache.put(slot, &json!(["x"])).unwrap();
        }
        cache.clear_all().unwrap();
        for slot in Slot::ALL {
            assert!(!cache.is_filled(slot).unwrap());
        }
    }

    #[test]
    fn no_temporary_files_left_behind() {
        let (_dir, cache) = cache();
        cache.put(Slot::JobMeta, &json!({"a": 1})).unwrap();
        cache.clear(Slot::Readings).unwrap();

        let names: Vec<String> = fs::read_dir(cache.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().all(|n| !n.ends_with(".tmp")), "{names:?}");
    }

    #[test]
    fn lock_is_exclusive_until_dropped() {
        let (_dir, cache) = cache();
        let other = JobCache::open(cache.dir()).unwrap();

        let held = cache.try_lock().unwrap().expect("first lock");
        assert!(other.try_lock().unwrap().is_none());
        assert!(cache.try_lock().unwrap().is_none());

        drop(held);
        assert!(other.try_lock().unwrap().is_some());
    }

    #[test]
    fn slot_names() {
        assert_eq!(Slot::FetchedItems.to_string(), "fetched-items");
        assert_eq!(Slot::JobMeta.to_string(), "job-meta");
        assert_eq!(Slot::Readings.to_string(), "readings");
    }
}
