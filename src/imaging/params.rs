//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [`generated`](crate::generated) orchestrator (which
//! decides what images to create) and the [`backend`](super::backend) (which
//! does the actual pixel work). This separation allows swapping backends
//! (e.g. for testing with a mock) without changing orchestration logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 75). Clamped on construction.
//! - [`OutputFormat`]: Encoders the backend knows, parsed from a file extension.
//! - [`PrepareParams`]: Decode, orient and crop a source.
//! - [`TransformParams`]: A prepared source resized and encoded to an output path.

use super::backend::BackendError;
use super::calculations::{CropGeometry, Gravity};
use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

/// Output encodings supported by the backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
    Tiff,
}

impl OutputFormat {
    /// Parse a lower-cased file extension.
    pub fn from_extension(ext: &str) -> Result<Self, BackendError> {
        match ext {
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::WebP),
            "avif" => Ok(Self::Avif),
            "tif" | "tiff" => Ok(Self::Tiff),
            other => Err(BackendError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Whether the encoder honours [`Quality`].
    pub fn is_lossy(self) -> bool {
        matches!(self, Self::Jpeg | Self::Avif)
    }
}

/// Decode a source and bring it to its post-crop, pre-resize state.
#[derive(Debug, Clone, PartialEq)]
pub struct PrepareParams {
    pub source: PathBuf,
    /// Apply EXIF orientation before cropping. Re-encoding never carries
    /// source metadata over, so this is the only effect of `strip_metadata`.
    pub auto_orient: bool,
    pub crop: Option<CropGeometry>,
    pub gravity: Gravity,
}

/// Full recipe for a variant: prepare, resize to `width`, encode.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformParams {
    pub prepare: PrepareParams,
    pub output: PathBuf,
    /// Target width; height follows the prepared aspect ratio.
    pub width: u32,
    pub format: OutputFormat,
    pub quality: Quality,
}
