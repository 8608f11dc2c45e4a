// SPDX-License-Identifier: MPL-2.0

//! Container detection utilities.
//!
//! Detection is based on:
//! 1. The six-byte signature at the start of the data
//! 2. File extension (quick filter when scanning asset directories)

use std::path::Path;

/// Signatures of the two GIF revisions.
const GIF_SIGNATURES: &[&[u8; 6]] = &[b"GIF87a", b"GIF89a"];

/// Check whether the bytes start with a GIF signature.
#[must_use]
pub fn looks_like_gif(bytes: &[u8]) -> bool {
    bytes
        .get(..6)
        .is_some_and(|header| GIF_SIGNATURES.iter().any(|sig| header == &sig[..]))
}

/// Check if a path points to a GIF file.
#[must_use]
pub fn is_gif_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gif"))
}

/// Check if an identifier names a remote resource rather than a local asset.
#[must_use]
pub fn is_remote(identifier: &str) -> bool {
    let lower = identifier.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
