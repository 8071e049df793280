//! Variant identities and source content digests.
//!
//! Every generated file carries a short identity in its name:
//!
//! ```text
//! _site/generated/somefolder/myimage-100-1234abcde.jpg
//!                                        ^^^^^^^^^
//! ```
//!
//! The identity is the MD5 of the concatenated inputs that change the pixels
//! of a variant (source digest, crop, gravity, quality), rendered as lower-case
//! hex and truncated to [`ID_LENGTH`] characters. Any change to an input
//! changes the filename, so a file existing at its computed path is proof that
//! it is current. There is no collision detection: two tuples that truncate to
//! the same identity share a filename.
//!
//! Width and format are deliberately not hashed here; they are already part
//! of the filename, and leaving them out lets the generated-metadata cache
//! share one record across every width/format with the same crop and quality.
//! Quality itself depends on (format, width) through the quality table, so in
//! practice two widths can still produce different identities.
//!
//! Changing [`ID_LENGTH`] or the input order renames every artifact ever
//! generated. Treat both as part of the on-disk format.

use md5::Md5;
use sha2::{Digest, Sha256};
use std::io;
use std::path::Path;

/// Number of hex characters kept from the identity hash.
pub const ID_LENGTH: usize = 9;

/// Identity used for sources that do not exist on disk.
///
/// Keeps names and URIs of missing images renderable without hashing
/// anything.
pub const MISSING_ID: &str = "xxxxxxxxx";

/// Compute the identity of a variant.
///
/// Inputs are concatenated without separators in the fixed order
/// `digest, crop, gravity, quality`.
pub fn variant_id(digest: &str, crop: Option<&str>, gravity: &str, quality: u32) -> String {
    let mut hasher = Md5::new();
    hasher.update(digest.as_bytes());
    hasher.update(crop.unwrap_or("").as_bytes());
    hasher.update(gravity.as_bytes());
    hasher.update(quality.to_string().as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(ID_LENGTH);
    hex
}

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{:x}", digest))
}
