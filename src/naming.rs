//! Deterministic artifact names.
//!
//! Every generated file is named after the variant that produced it:
//!
//! ```text
//! {base_name}-{width}-{id}.{format}
//! somefolder/myimage-100-1234abcde.webp
//! ```
//!
//! `base_name` is the source path relative to the source root, without its
//! extension, so sources in subdirectories produce artifacts in matching
//! subdirectories of the destination root.

use crate::identity::ID_LENGTH;

/// Format sentinel meaning "same as the source file".
pub const ORIGINAL_FORMAT: &str = "original";

/// Resolve a requested output format.
///
/// - `"original"` (any case) → the source extension
/// - anything else → lower-cased
///
/// `jpeg` and `jpg` are kept as written; the filename uses whichever the
/// caller asked for.
pub fn resolve_format(requested: &str, source_ext: &str) -> String {
    if requested.eq_ignore_ascii_case(ORIGINAL_FORMAT) {
        source_ext.to_string()
    } else {
        requested.to_lowercase()
    }
}

/// Build the artifact filename for a variant.
pub fn artifact_name(base_name: &str, width: u32, id: &str, format: &str) -> String {
    format!("{}-{}-{}.{}", base_name, width, id, format)
}

/// Check whether `file_name` is an artifact for `stem` at `width` in `format`,
/// whatever its identity.
///
/// `stem` is the last path component of the base name. The identity part
/// must be exactly [`ID_LENGTH`] characters, like the `?` run of the
/// `{stem}-{width}-?????????.{format}` glob it stands in for.
pub fn matches_artifact(file_name: &str, stem: &str, width: u32, format: &str) -> bool {
    let prefix = format!("{}-{}-", stem, width);
    let suffix = format!(".{}", format);
    let Some(rest) = file_name.strip_prefix(&prefix) else {
        return false;
    };
    let Some(id) = rest.strip_suffix(&suffix) else {
        return false;
    };
    id.chars().count() == ID_LENGTH && !id.contains('/')
}

/// Split a base name into its directory part and its final component.
///
/// ```text
/// "somefolder/myimage" → ("somefolder", "myimage")
/// "myimage"            → ("", "myimage")
/// ```
pub fn split_base_name(base_name: &str) -> (&str, &str) {
    match base_name.rsplit_once('/') {
        Some((dir, stem)) => (dir, stem),
        None => ("", base_name),
    }
}
