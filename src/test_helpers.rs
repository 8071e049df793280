//! Shared test utilities for the picture-cache test suite.
//!
//! Provides a stub [`SourceImage`] whose digest calls can be counted, and
//! writers for small synthetic JPEG/PNG fixtures.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let source = StubSource::new("img", "jpg").with_digest("aaaaaa");
//! assert_eq!(source.digest().unwrap(), "aaaaaa");
//! assert_eq!(source.digest_calls(), 1);
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{ImageEncoder, RgbImage};

use crate::imaging::Dimensions;
use crate::source::{SourceError, SourceImage};

// =========================================================================
// Stub source
// =========================================================================

/// In-memory [`SourceImage`] with a fixed digest.
///
/// `digest()` never touches the filesystem and counts how often it was
/// called, so tests can assert that a code path did not hash the source.
pub struct StubSource {
    pub base_name: String,
    pub path: PathBuf,
    pub ext: String,
    pub digest: String,
    pub missing: bool,
    pub dimensions: Dimensions,
    digest_calls: AtomicUsize,
}

impl StubSource {
    pub fn new(base_name: &str, ext: &str) -> Self {
        Self {
            base_name: base_name.to_string(),
            path: PathBuf::from(format!("/stub/{}.{}", base_name, ext)),
            ext: ext.to_string(),
            digest: "aaaaaa".to_string(),
            missing: false,
            dimensions: Dimensions {
                width: 400,
                height: 300,
            },
            digest_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_digest(mut self, digest: &str) -> Self {
        self.digest = digest.to_string();
        self
    }

    pub fn with_path(mut self, path: &Path) -> Self {
        self.path = path.to_path_buf();
        self
    }

    pub fn mark_missing(mut self) -> Self {
        self.missing = true;
        self
    }

    pub fn digest_calls(&self) -> usize {
        self.digest_calls.load(Ordering::SeqCst)
    }
}

impl SourceImage for StubSource {
    fn base_name(&self) -> &str {
        &self.base_name
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn digest(&self) -> Result<String, SourceError> {
        self.digest_calls.fetch_add(1, Ordering::SeqCst);
        if self.missing {
            return Err(SourceError::Missing(self.path.clone()));
        }
        Ok(self.digest.clone())
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
        Ok(self.dimensions)
    }
}

// =========================================================================
// Image fixtures
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// Create a small valid JPEG file with a colour gradient.
pub fn write_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = gradient(width, height);
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(writer, 90);
    encoder
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Create a small valid PNG file with a colour gradient.
pub fn write_test_png(path: &Path, width: u32, height: u32) {
    let img = gradient(width, height);
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    let encoder = image::codecs::png::PngEncoder::new(writer);
    encoder
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}
