//! Existence checks that skip hashing.
//!
//! A full build hashes every source to compute variant identities. With
//! `fast_build` enabled the generator first looks for *any* artifact matching
//! `{base}-{width}-?????????.{format}` and accepts it as current without
//! checking its identity, so unchanged sites build without reading a single
//! source file.
//!
//! This trades correctness for speed: an edited source that keeps its name
//! keeps its old artifacts until they are deleted.

use crate::naming::{matches_artifact, split_base_name};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Find an existing artifact for `base_name` at `width` in `format`.
///
/// When several identities exist the lexically first file name wins, so the
/// result does not depend on directory iteration order. A missing directory
/// is no match.
pub fn find_existing(
    dest_dir: &Path,
    base_name: &str,
    width: u32,
    format: &str,
) -> io::Result<Option<PathBuf>> {
    let (subdir, stem) = split_base_name(base_name);
    let dir = if subdir.is_empty() {
        dest_dir.to_path_buf()
    } else {
        dest_dir.join(subdir)
    };

    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut matches = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if matches_artifact(file_name, stem, width, format) {
            matches.push(file_name.to_string());
        }
    }
    matches.sort();

    let found = matches.into_iter().next().map(|name| dir.join(name));
    if let Some(path) = &found {
        debug!(path = %path.display(), "fast build match");
    }
    Ok(found)
}
