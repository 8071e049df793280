//! Image processing in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Measure** | decode + orient + crop, report dimensions |
//! | **Transform** | crop → Lanczos3 resize → JPEG/PNG/WebP/AVIF/TIFF encode |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for crop geometry and resize math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
pub mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend, TransformOutcome};
pub use calculations::{CropGeometry, Gravity, Region, crop_region, resize_height};
pub use params::{OutputFormat, PrepareParams, Quality, TransformParams};
pub use rust_backend::RustBackend;
