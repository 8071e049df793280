//! Batch generation.
//!
//! Runs every requested variant of every source image through a
//! [`Generator`] and tallies the cache outcome of each.
//!
//! ## Parallel Processing
//!
//! Sources are processed in parallel using [rayon](https://docs.rs/rayon),
//! and so are the variants of each source. Distinct variants write distinct
//! files; the generator's per-path locks cover the rest. Progress is reported
//! per source through an optional channel of [`ProcessEvent`]s, so the CLI
//! can print while work continues.
//!
//! ## Output
//!
//! ```text
//! _site/generated/
//! ├── img-400-e391bf5cd.webp
//! ├── img-800-e391bf5cd.webp
//! └── somefolder/
//!     └── myimage-400-1234abcde.jpg
//! ```

use crate::cache::CacheStats;
use crate::generated::{GenerateError, GenerateOutcome, Generator, VariantRequest};
use crate::imaging::ImageBackend;
use crate::source::SourceImage;
use rayon::prelude::*;
use std::path::Path;
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("{image}: {error}")]
    Generate {
        image: String,
        #[source]
        error: GenerateError,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cache outcome of one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantStatus {
    /// Existing file reused.
    Cached,
    /// New file written.
    Generated,
    /// Source absent; nothing written.
    Missing,
}

impl From<GenerateOutcome> for VariantStatus {
    fn from(outcome: GenerateOutcome) -> Self {
        match outcome {
            GenerateOutcome::Cached => Self::Cached,
            GenerateOutcome::Generated => Self::Generated,
            GenerateOutcome::SourceMissing => Self::Missing,
        }
    }
}

/// One produced (or skipped) variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantInfo {
    /// Display label, e.g. `800px webp`.
    pub label: String,
    /// Artifact name relative to the destination root.
    pub name: String,
    pub uri: String,
    pub status: VariantStatus,
}

/// All variants of one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    /// Source name relative to the source root.
    pub source: String,
    pub variants: Vec<VariantInfo>,
}

/// Progress events emitted while processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// Every variant of a source is done. `index` is 1-based, in input order.
    ImageProcessed {
        index: usize,
        source: String,
        variants: Vec<VariantInfo>,
    },
}

/// Result of a batch run.
#[derive(Debug, Default)]
pub struct ProcessResult {
    /// Processed sources, in input order.
    pub images: Vec<ProcessedImage>,
    pub stats: CacheStats,
}

/// Generate every `requests` variant of every image in `images`.
///
/// `images` are names relative to `source_root`. The first failure aborts
/// the batch; variants already written stay on disk and are cache hits on
/// the next run.
pub fn process<B: ImageBackend>(
    generator: &Generator<B>,
    source_root: &Path,
    images: &[String],
    requests: &[VariantRequest],
    progress: Option<Sender<ProcessEvent>>,
) -> Result<ProcessResult, ProcessError> {
    std::fs::create_dir_all(&generator.config().dest_dir)?;

    let processed: Vec<ProcessedImage> = images
        .par_iter()
        .enumerate()
        .map(|(i, name)| {
            let source = generator.open_source(source_root, name);
            let variants = process_source(generator, &source, requests).map_err(|error| {
                ProcessError::Generate {
                    image: name.clone(),
                    error,
                }
            })?;

            if let Some(tx) = &progress {
                tx.send(ProcessEvent::ImageProcessed {
                    index: i + 1,
                    source: name.clone(),
                    variants: variants.clone(),
                })
                .ok();
            }

            Ok(ProcessedImage {
                source: name.clone(),
                variants,
            })
        })
        .collect::<Result<Vec<_>, ProcessError>>()?;

    let mut stats = CacheStats::default();
    for variant in processed.iter().flat_map(|image| &image.variants) {
        match variant.status {
            VariantStatus::Cached => stats.hit(),
            VariantStatus::Generated => stats.miss(),
            VariantStatus::Missing => stats.skip_missing(),
        }
    }

    Ok(ProcessResult {
        images: processed,
        stats,
    })
}

/// Generate all variants of one source.
fn process_source<B: ImageBackend>(
    generator: &Generator<B>,
    source: &dyn SourceImage,
    requests: &[VariantRequest],
) -> Result<Vec<VariantInfo>, GenerateError> {
    requests
        .par_iter()
        .map(|request| {
            let image = generator.variant(source, request.clone())?;
            let status = image.generate()?.into();
            Ok(VariantInfo {
                label: format!("{}px {}", image.width(), image.format()),
                name: image.name().to_string(),
                uri: image.uri(),
                status,
            })
        })
        .collect()
}
