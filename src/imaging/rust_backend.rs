//! Pure Rust image processing backend, no system libraries.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::image_dimensions` (header only) |
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Auto-orient | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Crop | `DynamicImage::crop_imm` at the region from [`crop_region`] |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Encode → JPEG / AVIF | `JpegEncoder` / `AvifEncoder` (rav1e, speed 6) at the requested quality |
//! | Encode → PNG / WebP / TIFF | lossless encoders; quality is ignored |
//!
//! Encoding never copies EXIF, ICC or XMP data from the source, so every
//! output is metadata-free.

use super::backend::{BackendError, Dimensions, ImageBackend, TransformOutcome};
use super::calculations::{crop_region, resize_height};
use super::params::{OutputFormat, PrepareParams, Quality, TransformParams};
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_error(path: &Path, e: image::ImageError) -> BackendError {
    BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
}

/// Load and decode an image from disk, optionally applying EXIF orientation.
fn load_image(path: &Path, auto_orient: bool) -> Result<DynamicImage, BackendError> {
    let reader = ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?;
    let mut decoder = reader.into_decoder().map_err(|e| decode_error(path, e))?;
    let orientation = if auto_orient {
        decoder.orientation().ok()
    } else {
        None
    };
    let mut img = DynamicImage::from_decoder(decoder).map_err(|e| decode_error(path, e))?;
    if let Some(orientation) = orientation {
        img.apply_orientation(orientation);
    }
    Ok(img)
}

/// Decode, orient and crop.
fn prepare(params: &PrepareParams) -> Result<DynamicImage, BackendError> {
    let img = load_image(&params.source, params.auto_orient)?;
    match &params.crop {
        Some(geometry) => {
            let region = crop_region((img.width(), img.height()), geometry, params.gravity);
            Ok(img.crop_imm(region.x, region.y, region.width, region.height))
        }
        None => Ok(img),
    }
}

/// Encode `img` as `format` into a new file at `path`.
fn save_image(
    img: &DynamicImage,
    path: &Path,
    format: OutputFormat,
    quality: Quality,
) -> Result<(), BackendError> {
    let file = std::fs::File::create(path).map_err(BackendError::Io)?;
    let mut writer = BufWriter::new(file);
    let q = quality.value() as u8;

    let result = match format {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, q))
        }
        OutputFormat::Png => img.write_with_encoder(PngEncoder::new(&mut writer)),
        OutputFormat::WebP => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            rgba.write_with_encoder(WebPEncoder::new_lossless(&mut writer))
        }
        OutputFormat::Avif => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            rgba.write_with_encoder(AvifEncoder::new_with_speed_quality(&mut writer, 6, q))
        }
        OutputFormat::Tiff => img.write_to(&mut writer, ImageFormat::Tiff),
    };
    result.map_err(|e| {
        BackendError::ProcessingFailed(format!("{:?} encode failed: {}", format, e))
    })?;
    writer.flush().map_err(BackendError::Io)
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn measure(&self, params: &PrepareParams) -> Result<Dimensions, BackendError> {
        let img = prepare(params)?;
        Ok(Dimensions {
            width: img.width(),
            height: img.height(),
        })
    }

    fn transform(&self, params: &TransformParams) -> Result<TransformOutcome, BackendError> {
        let img = prepare(&params.prepare)?;
        let cropped = Dimensions {
            width: img.width(),
            height: img.height(),
        };

        let height = resize_height((cropped.width, cropped.height), params.width);
        let resized = img.resize_exact(params.width, height, FilterType::Lanczos3);

        save_image(&resized, &params.output, params.format, params.quality)?;

        Ok(TransformOutcome {
            cropped,
            output: Dimensions {
                width: resized.width(),
                height: resized.height(),
            },
        })
    }
}
