//! Persistent metadata records for incremental builds.
//!
//! Decoding an image just to learn its dimensions is the expensive part of a
//! cache hit. This module keeps small per-name records on disk so later
//! builds can answer dimension queries without touching pixels.
//!
//! # Design
//!
//! A [`CacheRecord`] is a flat `field → value` document tied to one logical
//! name. Its schema is closed: each instantiation declares the fields it may
//! hold through [`CacheSchema`], and [`CacheRecord::set`] rejects anything
//! else with [`CacheError::InvalidKey`]. This keeps typos from silently
//! growing the on-disk format.
//!
//! Two schemas exist:
//!
//! - [`SourceMeta`]: keyed by source name, extension included. Holds the
//!   source digest and its original (pre-crop) dimensions.
//! - [`GeneratedMeta`]: keyed by `{base_name}-{id}`. Holds the post-crop,
//!   pre-resize dimensions shared by every width/format with that identity.
//!
//! ## Lifecycle
//!
//! Records load lazily: [`CacheRecord::open`] does no I/O, the first
//! [`get`](CacheRecord::get) or [`set`](CacheRecord::set) reads the file. A
//! missing or unreadable file is an empty record, not an error. Nothing is
//! persisted until [`write`](CacheRecord::write) is called, and a write whose
//! content matches the file already on disk does not touch it.
//!
//! ## Storage
//!
//! ```text
//! <cache_dir>/
//! ├── source/
//! │   └── somefolder/myimage.jpg.json
//! └── generated/
//!     └── somefolder/myimage-1234abcde.json
//! ```
//!
//! Writes go to a temporary file in the same directory and are renamed into
//! place, so readers never observe a half-written record.
//!
//! ## Concurrency
//!
//! Several variants can share one generated record. Use
//! [`CacheRecord::update`] for read-modify-write sequences: it holds the
//! record's lock from the caller's [`PathLocks`], reloads the record from
//! disk, applies the change and writes. Updates sharing one registry are
//! never lost.

use crate::locks::PathLocks;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Suffix of every record file.
const RECORD_SUFFIX: &str = ".json";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("invalid cache key '{field}' for record '{record}'")]
    InvalidKey { field: String, record: String },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Declares the namespace and allowed fields of a record type.
pub trait CacheSchema {
    /// Subdirectory of the cache root holding records of this kind.
    const KIND: &'static str;
    /// Fields a record may hold.
    const FIELDS: &'static [&'static str];
}

/// Schema for source image metadata.
#[derive(Debug, Clone, Copy)]
pub struct SourceMeta;

impl CacheSchema for SourceMeta {
    const KIND: &'static str = "source";
    const FIELDS: &'static [&'static str] = &["digest", "width", "height"];
}

/// Schema for generated image metadata.
#[derive(Debug, Clone, Copy)]
pub struct GeneratedMeta;

impl CacheSchema for GeneratedMeta {
    const KIND: &'static str = "generated";
    const FIELDS: &'static [&'static str] = &["width", "height"];
}

pub type SourceCache = CacheRecord<SourceMeta>;
pub type GeneratedCache = CacheRecord<GeneratedMeta>;

/// A lazily loaded, explicitly written metadata record.
#[derive(Debug)]
pub struct CacheRecord<S> {
    name: String,
    path: PathBuf,
    fields: Option<BTreeMap<String, Value>>,
    _schema: PhantomData<S>,
}

impl<S: CacheSchema> CacheRecord<S> {
    /// Bind a record to its logical name. No I/O happens here.
    pub fn open(cache_dir: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: record_path::<S>(cache_dir, name),
            fields: None,
            _schema: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing file of this record.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a field, loading the record on first access.
    pub fn get(&mut self, field: &str) -> Option<&Value> {
        self.fields().get(field)
    }

    /// Look up a field holding an unsigned integer.
    pub fn get_u32(&mut self, field: &str) -> Option<u32> {
        self.get(field)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    }

    /// Look up a field holding a string.
    pub fn get_str(&mut self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Set a field in memory.
    ///
    /// Fails with [`CacheError::InvalidKey`] if the schema does not declare
    /// `field`.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<(), CacheError> {
        if !S::FIELDS.contains(&field) {
            return Err(CacheError::InvalidKey {
                field: field.to_string(),
                record: self.name.clone(),
            });
        }
        self.fields().insert(field.to_string(), value.into());
        Ok(())
    }

    /// Drop every field from the in-memory record.
    pub fn clear(&mut self) {
        self.fields = Some(BTreeMap::new());
    }

    /// Persist the full in-memory record.
    ///
    /// Parent directories are created as needed. Writing content identical
    /// to the current file is a no-op.
    pub fn write(&mut self) -> Result<(), CacheError> {
        let json = serde_json::to_string_pretty(&*self.fields())?;

        if std::fs::read_to_string(&self.path).is_ok_and(|current| current == json) {
            return Ok(());
        }

        let parent = self.path.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent)?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        debug!(record = %self.name, kind = S::KIND, "wrote cache record");
        Ok(())
    }

    /// Locked read-modify-write of the record named `name`.
    ///
    /// The record is reloaded from disk while `locks` holds its path, handed
    /// to `f`, and written back if `f` succeeds.
    pub fn update<R>(
        locks: &PathLocks,
        cache_dir: &Path,
        name: &str,
        f: impl FnOnce(&mut Self) -> Result<R, CacheError>,
    ) -> Result<R, CacheError> {
        let path = record_path::<S>(cache_dir, name);
        locks.with_lock(&path, || {
            let mut record = Self::open(cache_dir, name);
            let result = f(&mut record)?;
            record.write()?;
            Ok(result)
        })
    }

    fn fields(&mut self) -> &mut BTreeMap<String, Value> {
        self.fields.get_or_insert_with(|| load_fields::<S>(&self.path))
    }
}

fn record_path<S: CacheSchema>(cache_dir: &Path, name: &str) -> PathBuf {
    cache_dir
        .join(S::KIND)
        .join(format!("{}{}", name, RECORD_SUFFIX))
}

/// Read a record file. Missing or corrupt files load as empty records, and
/// fields outside the schema are dropped.
fn load_fields<S: CacheSchema>(path: &Path) -> BTreeMap<String, Value> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return BTreeMap::new(),
    };
    let mut fields: BTreeMap<String, Value> = match serde_json::from_str(&content) {
        Ok(f) => f,
        Err(_) => return BTreeMap::new(),
    };
    fields.retain(|k, _| S::FIELDS.contains(&k.as_str()));
    fields
}

/// Summary of cache performance for a build run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub cached: u32,
    pub generated: u32,
    pub missing: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.cached += 1;
    }

    pub fn miss(&mut self) {
        self.generated += 1;
    }

    pub fn skip_missing(&mut self) {
        self.missing += 1;
    }

    pub fn total(&self) -> u32 {
        self.cached + self.generated + self.missing
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cached == 0 && self.missing == 0 {
            return write!(f, "{} generated", self.generated);
        }
        write!(f, "{} cached, {} generated", self.cached, self.generated)?;
        if self.missing > 0 {
            write!(f, ", {} missing", self.missing)?;
        }
        write!(f, " ({} total)", self.total())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    // =========================================================================
    // Lazy load
    // =========================================================================

    #[test]
    fn open_does_no_io() {
        let tmp = TempDir::new().unwrap();
        let record = SourceCache::open(tmp.path(), "img.jpg");
        assert_eq!(record.path(), tmp.path().join("source/img.jpg.json"));
        assert!(!tmp.path().join("source").exists());
    }

    #[test]
    fn missing_file_is_empty_record() {
        let tmp = TempDir::new().unwrap();
        let mut record = SourceCache::open(tmp.path(), "img.jpg");
        assert_eq!(record.get("width"), None);
        assert_eq!(record.get_u32("height"), None);
    }

    #[test]
    fn corrupt_file_is_empty_record() {
        let tmp = TempDir::new().unwrap();
        let mut record = GeneratedCache::open(tmp.path(), "img-abc");
        fs::create_dir_all(record.path().parent().unwrap()).unwrap();
        fs::write(record.path(), "not json").unwrap();
        assert_eq!(record.get("width"), None);
    }

    #[test]
    fn reads_never_write() {
        let tmp = TempDir::new().unwrap();
        let mut record = SourceCache::open(tmp.path(), "img.jpg");
        record.get("width");
        record.set("width", 100).unwrap();
        assert!(!record.path().exists());
    }

    #[test]
    fn unknown_fields_on_disk_are_dropped() {
        let tmp = TempDir::new().unwrap();
        let mut record = GeneratedCache::open(tmp.path(), "img-abc");
        fs::create_dir_all(record.path().parent().unwrap()).unwrap();
        fs::write(record.path(), r#"{"width": 10, "digest": "d"}"#).unwrap();
        assert_eq!(record.get_u32("width"), Some(10));
        assert_eq!(record.get("digest"), None);
    }

    // =========================================================================
    // Schema enforcement
    // =========================================================================

    #[test]
    fn set_declared_field() {
        let tmp = TempDir::new().unwrap();
        let mut record = SourceCache::open(tmp.path(), "img.jpg");
        record.set("width", 100).unwrap();
        assert_eq!(record.get_u32("width"), Some(100));
    }

    #[test]
    fn set_undeclared_field_fails() {
        let tmp = TempDir::new().unwrap();
        let mut record = SourceCache::open(tmp.path(), "img.jpg");
        let err = record.set("asdf", 100).unwrap_err();
        assert!(matches!(
            err,
            CacheError::InvalidKey { ref field, ref record } if field == "asdf" && record == "img.jpg"
        ));
    }

    #[test]
    fn generated_schema_rejects_digest() {
        let tmp = TempDir::new().unwrap();
        let mut record = GeneratedCache::open(tmp.path(), "img-abc");
        assert!(matches!(
            record.set("digest", "abc"),
            Err(CacheError::InvalidKey { .. })
        ));
    }

    // =========================================================================
    // Write / reload
    // =========================================================================

    #[test]
    fn write_creates_file() {
        let tmp = TempDir::new().unwrap();
        let mut record = SourceCache::open(tmp.path(), "img.jpg");
        record.set("width", 100).unwrap();
        record.write().unwrap();
        assert!(tmp.path().join("source/img.jpg.json").exists());
    }

    #[test]
    fn write_then_fresh_load_returns_value() {
        let tmp = TempDir::new().unwrap();
        let mut record = SourceCache::open(tmp.path(), "img.jpg");
        record.set("width", 100).unwrap();
        record.set("digest", "abc123").unwrap();
        record.write().unwrap();

        let mut fresh = SourceCache::open(tmp.path(), "img.jpg");
        assert_eq!(fresh.get_u32("width"), Some(100));
        assert_eq!(fresh.get_str("digest"), Some("abc123"));
    }

    #[test]
    fn nested_names_create_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let mut record = GeneratedCache::open(tmp.path(), "a/b/img-123456789");
        record.set("height", 80).unwrap();
        record.write().unwrap();
        assert!(tmp.path().join("generated/a/b/img-123456789.json").exists());
    }

    #[test]
    fn unwritten_changes_are_invisible() {
        let tmp = TempDir::new().unwrap();
        let mut record = SourceCache::open(tmp.path(), "img.jpg");
        record.set("width", 100).unwrap();

        let mut other = SourceCache::open(tmp.path(), "img.jpg");
        assert_eq!(other.get("width"), None);
    }

    #[test]
    fn set_preserves_existing_fields() {
        let tmp = TempDir::new().unwrap();
        let mut first = GeneratedCache::open(tmp.path(), "img-abc");
        first.set("width", 100).unwrap();
        first.write().unwrap();

        let mut second = GeneratedCache::open(tmp.path(), "img-abc");
        second.set("height", 80).unwrap();
        second.write().unwrap();

        let mut fresh = GeneratedCache::open(tmp.path(), "img-abc");
        assert_eq!(fresh.get_u32("width"), Some(100));
        assert_eq!(fresh.get_u32("height"), Some(80));
    }

    #[test]
    fn rewrite_identical_content_is_noop() {
        let tmp = TempDir::new().unwrap();
        let mut record = SourceCache::open(tmp.path(), "img.jpg");
        record.set("width", 100).unwrap();
        record.write().unwrap();
        let before = fs::metadata(record.path()).unwrap().modified().unwrap();
        let content = fs::read_to_string(record.path()).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(20));
        record.write().unwrap();

        assert_eq!(fs::read_to_string(record.path()).unwrap(), content);
        assert_eq!(fs::metadata(record.path()).unwrap().modified().unwrap(), before);
    }

    #[test]
    fn clear_then_write_empties_record() {
        let tmp = TempDir::new().unwrap();
        let mut record = SourceCache::open(tmp.path(), "img.jpg");
        record.set("width", 100).unwrap();
        record.write().unwrap();

        record.clear();
        record.write().unwrap();

        let mut fresh = SourceCache::open(tmp.path(), "img.jpg");
        assert_eq!(fresh.get("width"), None);
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().to_path_buf();
        let locks = PathLocks::new();

        ["width", "height"].par_iter().for_each(|field| {
            GeneratedCache::update(&locks, &dir, "shared-abc", |r| r.set(field, 7)).unwrap();
        });
        assert!(locks.is_empty());

        let mut fresh = GeneratedCache::open(tmp.path(), "shared-abc");
        assert_eq!(fresh.get_u32("width"), Some(7));
        assert_eq!(fresh.get_u32("height"), Some(7));
    }

    #[test]
    fn failed_update_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let locks = PathLocks::new();
        let result =
            GeneratedCache::update(&locks, tmp.path(), "img-abc", |r| r.set("bogus", 1));
        assert!(result.is_err());
        assert!(!tmp.path().join("generated/img-abc.json").exists());
    }

    // =========================================================================
    // CacheStats
    // =========================================================================

    #[test]
    fn cache_stats_display_with_hits() {
        let stats = CacheStats {
            cached: 5,
            generated: 2,
            missing: 0,
        };
        assert_eq!(format!("{}", stats), "5 cached, 2 generated (7 total)");
    }

    #[test]
    fn cache_stats_display_with_missing() {
        let stats = CacheStats {
            cached: 3,
            generated: 2,
            missing: 1,
        };
        assert_eq!(
            format!("{}", stats),
            "3 cached, 2 generated, 1 missing (6 total)"
        );
    }

    #[test]
    fn cache_stats_display_no_hits() {
        let mut stats = CacheStats::default();
        stats.miss();
        stats.miss();
        stats.miss();
        assert_eq!(format!("{}", stats), "3 generated");
    }
}
