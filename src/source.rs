//! Source images.
//!
//! The generator never reads source files directly. It goes through the
//! [`SourceImage`] contract, which exposes the few facts a variant needs: a
//! base name for the output filename, a content digest for the identity, and
//! the original dimensions.
//!
//! [`SourceFile`] is the filesystem implementation. It is cheap to build:
//! nothing is read until a digest or dimension is asked for, and both are
//! memoized in the source metadata cache. Records are keyed by the full
//! source name, so `img.jpg` and `img.png` never share one. Recorded
//! dimensions are trusted only while the recorded digest matches the file's.
//!
//! ## Digest reuse
//!
//! Hashing is the only per-build cost of a full cache hit. In fast-build
//! mode a digest already recorded for the source is returned without
//! re-reading the file, so edits to a source that keeps its name go
//! unnoticed until the recorded digest is cleared.

use crate::cache::{CacheError, SourceCache};
use crate::config::BuildConfig;
use crate::identity::hash_file;
use crate::imaging::{BackendError, Dimensions, ImageBackend};
use crate::locks::PathLocks;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("source image not found: {0}")]
    Missing(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// What the generator needs to know about a source image.
pub trait SourceImage: Sync {
    /// Path relative to the source root without its extension, with `/`
    /// separators. Becomes the stem of every artifact name.
    fn base_name(&self) -> &str;

    /// Absolute path of the file.
    fn path(&self) -> &Path;

    /// Content digest. Fails with [`SourceError::Missing`] for missing files.
    fn digest(&self) -> Result<String, SourceError>;

    /// Whether the file is absent. Missing sources are skipped, not errors.
    fn missing(&self) -> bool;

    /// File extension as written, without the dot.
    fn ext(&self) -> &str;

    /// Original (pre-crop) pixel dimensions.
    fn dimensions(&self) -> Result<Dimensions, SourceError>;
}

/// A source image on disk.
pub struct SourceFile<'b> {
    /// Normalized name relative to the source root, extension included.
    name: String,
    base_name: String,
    path: PathBuf,
    ext: String,
    missing: bool,
    cache_dir: PathBuf,
    fast_build: bool,
    backend: &'b dyn ImageBackend,
    locks: &'b PathLocks,
    digest: OnceLock<String>,
}

impl<'b> SourceFile<'b> {
    /// Bind `name`, a path relative to `source_root`.
    ///
    /// Only checks existence; the file is not read. Metadata record updates
    /// are serialized through `locks`.
    pub fn open(
        source_root: &Path,
        name: &str,
        config: &BuildConfig,
        backend: &'b dyn ImageBackend,
        locks: &'b PathLocks,
    ) -> Self {
        let name = normalize_name(name);
        let (base_name, ext) = split_extension(&name);
        let (base_name, ext) = (base_name.to_string(), ext.to_string());
        let path = source_root.join(&name);
        let missing = !path.is_file();
        if missing {
            debug!(path = %path.display(), "source image missing");
        }
        Self {
            base_name,
            ext,
            name,
            missing,
            path,
            cache_dir: config.cache_dir.clone(),
            fast_build: config.fast_build,
            backend,
            locks,
            digest: OnceLock::new(),
        }
    }

    fn cache(&self) -> SourceCache {
        SourceCache::open(&self.cache_dir, &self.name)
    }

    fn update_cache(
        &self,
        f: impl FnOnce(&mut SourceCache) -> Result<(), CacheError>,
    ) -> Result<(), CacheError> {
        SourceCache::update(self.locks, &self.cache_dir, &self.name, f)
    }

    fn compute_digest(&self) -> Result<String, SourceError> {
        if self.missing {
            return Err(SourceError::Missing(self.path.clone()));
        }

        if self.fast_build
            && let Some(digest) = self.cache().get_str("digest")
        {
            debug!(source = %self.name, "reusing recorded digest");
            return Ok(digest.to_string());
        }

        let digest = hash_file(&self.path)?;

        self.update_cache(|record| adopt_digest(record, &digest))?;

        Ok(digest)
    }
}

impl SourceImage for SourceFile<'_> {
    fn base_name(&self) -> &str {
        &self.base_name
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn digest(&self) -> Result<String, SourceError> {
        if let Some(digest) = self.digest.get() {
            return Ok(digest.clone());
        }
        let digest = self.compute_digest()?;
        Ok(self.digest.get_or_init(|| digest).clone())
    }

    fn missing(&self) -> bool {
        self.missing
    }

    fn ext(&self) -> &str {
        &self.ext
    }

    fn dimensions(&self) -> Result<Dimensions, SourceError> {
        if self.missing {
            return Err(SourceError::Missing(self.path.clone()));
        }

        let digest = self.digest()?;

        let mut record = self.cache();
        if record.get_str("digest") == Some(digest.as_str())
            && let (Some(width), Some(height)) = (record.get_u32("width"), record.get_u32("height"))
        {
            return Ok(Dimensions { width, height });
        }

        let dims = self.backend.identify(&self.path)?;
        self.update_cache(|record| {
            adopt_digest(record, &digest)?;
            record.set("width", dims.width)?;
            record.set("height", dims.height)
        })?;
        Ok(dims)
    }
}

/// Point `record` at `digest`. A different digest invalidates the recorded
/// dimensions.
fn adopt_digest(record: &mut SourceCache, digest: &str) -> Result<(), CacheError> {
    if record.get_str("digest") != Some(digest) {
        record.clear();
        record.set("digest", digest)?;
    }
    Ok(())
}

/// Use `/` separators and drop leading `./` or `/`.
fn normalize_name(name: &str) -> String {
    let name = name.replace('\\', "/");
    let mut rest = name.as_str();
    loop {
        if let Some(r) = rest.strip_prefix("./") {
            rest = r;
        } else if let Some(r) = rest.strip_prefix('/') {
            rest = r;
        } else {
            break;
        }
    }
    rest.to_string()
}

/// Split `dir/name.ext` into `("dir/name", "ext")`.
///
/// Only the last component is considered, and a leading dot does not start
/// an extension.
fn split_extension(name: &str) -> (&str, &str) {
    let stem_start = name.rfind('/').map_or(0, |i| i + 1);
    match name[stem_start..].rfind('.') {
        Some(0) | None => (name, ""),
        Some(dot) => {
            let dot = stem_start + dot;
            (&name[..dot], &name[dot + 1..])
        }
    }
}
