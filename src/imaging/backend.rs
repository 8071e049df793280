//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations the generator
//! needs: identify, measure, and transform.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Everything is statically linked into the binary; tests use a mock
//! that records calls instead of touching pixels.

use super::params::{PrepareParams, TransformParams};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),
    #[error("Invalid crop: {0}")]
    InvalidCrop(String),
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// What a transform produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformOutcome {
    /// Source dimensions after orientation and crop, before resizing.
    pub cropped: Dimensions,
    /// Dimensions of the encoded output.
    pub output: Dimensions,
}

/// Trait for image processing backends.
pub trait ImageBackend: Sync {
    /// Get image dimensions from the file header.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode, orient and crop without writing anything; return the result's
    /// dimensions.
    fn measure(&self, params: &PrepareParams) -> Result<Dimensions, BackendError>;

    /// Produce a variant at `params.output`.
    fn transform(&self, params: &TransformParams) -> Result<TransformOutcome, BackendError>;
}
