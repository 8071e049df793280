//! CLI output formatting.
//!
//! Output is **source-centric**: each source image is a header line with its
//! positional index, followed by one indented line per variant with its cache
//! status and artifact name.
//!
//! ```text
//! 001 photos/dawn.jpg
//!     400px webp: generated → photos/dawn-400-e391bf5cd.webp
//!     800px webp: cached → photos/dawn-800-e391bf5cd.webp
//! 002 gone.jpg
//!     400px webp: missing
//!
//! Cache: 1 cached, 1 generated, 1 missing (3 total)
//! ```
//!
//! # Architecture
//!
//! Each kind of output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::cache::CacheStats;
use crate::process::{ProcessEvent, VariantInfo, VariantStatus};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn status_str(status: VariantStatus) -> &'static str {
    match status {
        VariantStatus::Cached => "cached",
        VariantStatus::Generated => "generated",
        VariantStatus::Missing => "missing",
    }
}

/// Format one variant line. Missing variants have no artifact to point at.
fn variant_line(variant: &VariantInfo) -> String {
    match variant.status {
        VariantStatus::Missing => format!(
            "{}{}: {}",
            indent(1),
            variant.label,
            status_str(variant.status)
        ),
        status => format!(
            "{}{}: {} \u{2192} {}",
            indent(1),
            variant.label,
            status_str(status),
            variant.name
        ),
    }
}

/// Format a single process progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::ImageProcessed {
            index,
            source,
            variants,
        } => {
            let mut lines = Vec::with_capacity(variants.len() + 1);
            lines.push(format!("{} {}", format_index(*index), source));
            lines.extend(variants.iter().map(variant_line));
            lines
        }
    }
}

/// Print a process event to stdout.
pub fn print_process_event(event: &ProcessEvent) {
    for line in format_process_event(event) {
        println!("{}", line);
    }
}

/// Format the end-of-build cache summary.
pub fn format_summary(stats: &CacheStats) -> Vec<String> {
    if stats.total() == 0 {
        return vec!["No images requested".to_string()];
    }
    vec![String::new(), format!("Cache: {}", stats)]
}

/// Print the end-of-build cache summary to stdout.
pub fn print_summary(stats: &CacheStats) {
    for line in format_summary(stats) {
        println!("{}", line);
    }
}
