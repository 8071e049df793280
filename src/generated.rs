//! Generated image variants.
//!
//! A [`Generator`] carries everything a build needs (configuration, image
//! backend, quality and URI resolvers, per-path locks) and hands out
//! [`GeneratedImage`]s, one per requested variant of a source.
//!
//! ## Generation
//!
//! ```text
//! variant(source, width, format, crop, gravity)
//!   │
//!   ├─ missing source ─────────────→ id = xxxxxxxxx, generate() is a no-op
//!   ├─ fast build + matching file ─→ that file, no digest
//!   └─ otherwise ──────────────────→ id = variant_id(digest, crop, gravity, quality)
//!
//! generate()
//!   ├─ file exists ─→ Cached (nothing decoded)
//!   └─ else ────────→ orient → crop → resize → encode → temp file
//!                     → chmod 644 → rename → record post-crop dimensions
//! ```
//!
//! The artifact path is the cache: if a file exists at the computed path it
//! is current, because every input that affects its pixels is in its name.
//! Writes go through a temporary file in the destination directory, so a
//! failed transform never leaves a partial artifact behind.

use crate::cache::{CacheError, GeneratedCache};
use crate::config::BuildConfig;
use crate::fast_build::find_existing;
use crate::identity::{MISSING_ID, variant_id};
use crate::imaging::{
    BackendError, CropGeometry, Dimensions, Gravity, ImageBackend, OutputFormat, PrepareParams,
    Quality, TransformParams,
};
use crate::locks::PathLocks;
use crate::naming::{artifact_name, resolve_format, split_base_name};
use crate::quality::{QualityResolver, QualityTable};
use crate::source::{SourceError, SourceFile, SourceImage};
use crate::uri::{BaseUrl, UriBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
    #[error("Image processing failed: {0}")]
    Backend(#[from] BackendError),
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One requested variant of a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantRequest {
    pub width: u32,
    /// Output format, or `"original"` for the source's own extension.
    pub format: String,
    /// Crop geometry, e.g. `16:9` or `400x300+10+10`.
    pub crop: Option<String>,
    /// Crop anchor; empty means north-west.
    pub gravity: String,
}

impl VariantRequest {
    pub fn new(width: u32, format: &str) -> Self {
        Self {
            width,
            format: format.to_string(),
            crop: None,
            gravity: String::new(),
        }
    }

    pub fn with_crop(mut self, crop: &str, gravity: &str) -> Self {
        self.crop = Some(crop.to_string());
        self.gravity = gravity.to_string();
        self
    }
}

/// What [`GeneratedImage::generate`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// A new file was written.
    Generated,
    /// The file already existed.
    Cached,
    /// The source does not exist; nothing was written.
    SourceMissing,
}

/// Build context shared by every variant.
pub struct Generator<B> {
    config: BuildConfig,
    backend: B,
    quality: Box<dyn QualityResolver>,
    uri: Box<dyn UriBuilder>,
    /// Guards both artifact paths and metadata record paths.
    locks: PathLocks,
}

impl<B: ImageBackend> Generator<B> {
    /// Quality and URIs default to the configured table and `base_url`.
    pub fn new(config: BuildConfig, backend: B) -> Self {
        let quality = QualityTable::from_config(&config.quality);
        let uri = BaseUrl::new(&config.base_url);
        Self {
            config,
            backend,
            quality: Box::new(quality),
            uri: Box::new(uri),
            locks: PathLocks::new(),
        }
    }

    pub fn with_quality_resolver(mut self, resolver: impl QualityResolver + 'static) -> Self {
        self.quality = Box::new(resolver);
        self
    }

    pub fn with_uri_builder(mut self, builder: impl UriBuilder + 'static) -> Self {
        self.uri = Box::new(builder);
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Open `name` (relative to `source_root`) as a source backed by this
    /// generator's cache and backend.
    pub fn open_source(&self, source_root: &Path, name: &str) -> SourceFile<'_> {
        SourceFile::open(
            source_root,
            name,
            &self.config,
            &self.backend,
            &self.locks,
        )
    }

    /// Resolve the identity and target path of a variant.
    ///
    /// Hashes the source unless it is missing or fast build finds an
    /// existing file. Nothing is decoded or written.
    pub fn variant<'g>(
        &'g self,
        source: &'g dyn SourceImage,
        request: VariantRequest,
    ) -> Result<GeneratedImage<'g, B>, GenerateError> {
        let format = resolve_format(&request.format, source.ext());
        let quality = self.quality.quality(&format, request.width);
        let base_name = source.base_name();

        let matched = if source.missing() || !self.config.fast_build {
            None
        } else {
            find_existing(&self.config.dest_dir, base_name, request.width, &format)?
        };

        let (id, name) = match matched {
            Some(path) => {
                let (dir, _) = split_base_name(base_name);
                let file_name = path
                    .file_name()
                    .map(|f| f.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let id = id_from_file_name(&file_name, &format);
                let name = if dir.is_empty() {
                    file_name
                } else {
                    format!("{}/{}", dir, file_name)
                };
                (id, name)
            }
            None => {
                let id = if source.missing() {
                    MISSING_ID.to_string()
                } else {
                    variant_id(
                        &source.digest()?,
                        request.crop.as_deref(),
                        &request.gravity,
                        quality,
                    )
                };
                let name = artifact_name(base_name, request.width, &id, &format);
                (id, name)
            }
        };

        let path = self.config.dest_dir.join(&name);
        Ok(GeneratedImage {
            generator: self,
            source,
            width: request.width,
            format,
            crop: request.crop,
            gravity: request.gravity,
            quality,
            id,
            name,
            path,
        })
    }
}

/// The identity part of `{stem}-{width}-{id}.{format}`.
fn id_from_file_name(file_name: &str, format: &str) -> String {
    let without_ext = file_name
        .strip_suffix(format)
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or(file_name);
    without_ext
        .rsplit_once('-')
        .map(|(_, id)| id.to_string())
        .unwrap_or_default()
}

/// A variant of one source: a target file plus the recipe to produce it.
pub struct GeneratedImage<'g, B> {
    generator: &'g Generator<B>,
    source: &'g dyn SourceImage,
    width: u32,
    format: String,
    crop: Option<String>,
    gravity: String,
    quality: u32,
    id: String,
    name: String,
    path: PathBuf,
}

impl<B: ImageBackend> GeneratedImage<'_, B> {
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Resolved output format (never `"original"`).
    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn quality(&self) -> u32 {
        self.quality
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Artifact name relative to the destination root.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn absolute_path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn uri(&self) -> String {
        self.generator.uri.uri(&self.name)
    }

    /// Make sure the artifact exists, producing it if needed.
    pub fn generate(&self) -> Result<GenerateOutcome, GenerateError> {
        if self.source.missing() {
            debug!(source = %self.source.path().display(), "skipping missing source");
            return Ok(GenerateOutcome::SourceMissing);
        }
        if self.exists() {
            debug!(name = %self.name, "cache hit");
            return Ok(GenerateOutcome::Cached);
        }

        self.generator.locks.with_lock(&self.path, || {
            // Another task may have produced it while we waited.
            if self.exists() {
                return Ok(GenerateOutcome::Cached);
            }
            self.write_artifact()?;
            Ok(GenerateOutcome::Generated)
        })
    }

    /// Post-crop, pre-resize width of the source. `None` for missing sources.
    pub fn source_width(&self) -> Result<Option<u32>, GenerateError> {
        Ok(self.source_dimensions()?.map(|d| d.width))
    }

    /// Post-crop, pre-resize height of the source. `None` for missing sources.
    pub fn source_height(&self) -> Result<Option<u32>, GenerateError> {
        Ok(self.source_dimensions()?.map(|d| d.height))
    }

    fn source_dimensions(&self) -> Result<Option<Dimensions>, GenerateError> {
        if self.source.missing() {
            return Ok(None);
        }

        let config = &self.generator.config;
        let mut record = GeneratedCache::open(&config.cache_dir, &self.cache_name());
        if let (Some(width), Some(height)) = (record.get_u32("width"), record.get_u32("height")) {
            return Ok(Some(Dimensions { width, height }));
        }

        let dims = self.generator.backend.measure(&self.prepare_params()?)?;
        self.record_dimensions(dims)?;
        Ok(Some(dims))
    }

    /// Generated-metadata key: shared by every width and format with the
    /// same identity.
    fn cache_name(&self) -> String {
        format!("{}-{}", self.source.base_name(), self.id)
    }

    fn record_dimensions(&self, dims: Dimensions) -> Result<(), GenerateError> {
        let generator = self.generator;
        let name = self.cache_name();
        GeneratedCache::update(&generator.locks, &generator.config.cache_dir, &name, |record| {
            record.set("width", dims.width)?;
            record.set("height", dims.height)
        })?;
        Ok(())
    }

    fn prepare_params(&self) -> Result<PrepareParams, GenerateError> {
        let crop = self
            .crop
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(CropGeometry::parse)
            .transpose()?;
        Ok(PrepareParams {
            source: self.source.path().to_path_buf(),
            auto_orient: self.generator.config.strip_metadata,
            crop,
            gravity: Gravity::parse(&self.gravity)?,
        })
    }

    fn write_artifact(&self) -> Result<(), GenerateError> {
        let format = OutputFormat::from_extension(&self.format.to_lowercase())?;
        let prepare = self.prepare_params()?;

        info!(name = %self.name, "Generating new image file");

        let parent = self.path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent)?;
        // Dropping the temp path on error removes the partial file.
        let tmp = tempfile::NamedTempFile::new_in(parent)?.into_temp_path();

        let outcome = self.generator.backend.transform(&TransformParams {
            prepare,
            output: tmp.to_path_buf(),
            width: self.width,
            format,
            quality: Quality::new(self.quality),
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o644))?;
        }
        tmp.persist(&self.path).map_err(|e| e.error)?;

        self.record_dimensions(outcome.cropped)?;
        Ok(())
    }
}
