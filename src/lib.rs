//! # Picture Cache
//!
//! Content-addressed generation of responsive image variants for static
//! site builds. Given a source image and a requested variant (width, format,
//! crop, gravity), it produces the resized file once and recognizes it on
//! every later build without decoding anything.
//!
//! # Architecture: The Filename Is the Cache
//!
//! Every variant is named after all of its inputs:
//!
//! ```text
//! {base_name}-{width}-{id}.{format}
//! id = md5(source digest + crop + gravity + quality)[..9]
//! ```
//!
//! If a file exists at that path it is current; a changed input produces a
//! different name. There is no manifest to keep in sync and no eviction:
//! stale files are simply never referenced again.
//!
//! Dimension queries are the other expensive part of a page build. Small
//! JSON records under the cache directory remember source dimensions (keyed
//! by source file name) and post-crop dimensions (keyed by source name + id), so
//! a fully cached build never decodes a pixel.
//!
//! ```text
//! variant request
//!   → identity (source digest, crop, gravity, quality)
//!   → exists? ─ yes → done
//!             └ no  → orient → crop → resize → encode → temp → chmod 644 → rename
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`identity`] | Variant identity hash and source content digests |
//! | [`naming`] | Artifact filenames and the `"original"` format sentinel |
//! | [`cache`] | Schema-checked metadata records, build statistics |
//! | [`locks`] | Per-path mutexes for concurrent builds |
//! | [`source`] | Source image contract and the filesystem implementation |
//! | [`fast_build`] | Existence checks that skip hashing |
//! | [`quality`] | `(format, width)` → quality lookup |
//! | [`uri`] | Artifact name → public URI |
//! | [`imaging`] | Pure-Rust decode, crop, resize and encode |
//! | [`generated`] | The generator: identity, existence check, transform, metadata |
//! | [`process`] | Parallel batch runs over many sources and variants |
//! | [`config`] | `picture-cache.toml` loading, validation and merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Width and Format Stay Out of the Identity
//!
//! The identity hashes what changes pixels before resizing. Width and format
//! are already in the filename, and leaving them out lets one
//! generated-metadata record serve every width and format of a crop. Quality
//! is hashed, and because it can depend on width through the quality table,
//! two widths may still get different identities. The formula is part of the
//! on-disk format; changing it renames every artifact.
//!
//! ## Fast Build Trades Correctness for Speed
//!
//! Hashing sources is the only cost of a fully cached build. With
//! `fast_build` on, any file matching `{base_name}-{width}-?????????.{format}`
//! is accepted without computing a digest. Edits to a source that keeps its
//! name go unnoticed until its old variants are deleted.
//!
//! ## Missing Sources Are Not Errors
//!
//! A missing source gets the placeholder identity `xxxxxxxxx`: its names and
//! URIs still render, nothing is written, and the build goes on.

pub mod cache;
pub mod config;
pub mod fast_build;
pub mod generated;
pub mod identity;
pub mod imaging;
pub mod locks;
pub mod naming;
pub mod output;
pub mod process;
pub mod quality;
pub mod source;
pub mod uri;

#[cfg(test)]
pub(crate) mod test_helpers;
