//! Output format inference.
//!
//! The file extension is the only thing consulted: `png` and `webp` map to
//! their own encoders, `heic` has no encoder at all, and everything else is
//! written as JPEG.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Encoders an image can be re-written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
}

impl CompressFormat {
    /// Canonical extension written for this format.
    pub fn extension(self) -> &'static str {
        match self {
            CompressFormat::Jpeg => "jpg",
            CompressFormat::Png => "png",
            CompressFormat::Webp => "webp",
        }
    }

    /// Map a content MIME type to a format. Only the three encodable image
    /// types are recognised; `image/jpg` is accepted alongside `image/jpeg`.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime {
            "image/jpg" | "image/jpeg" => Some(CompressFormat::Jpeg),
            "image/png" => Some(CompressFormat::Png),
            "image/webp" => Some(CompressFormat::Webp),
            _ => None,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            CompressFormat::Jpeg => "image/jpeg",
            CompressFormat::Png => "image/png",
            CompressFormat::Webp => "image/webp",
        }
    }
}

impl fmt::Display for CompressFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressFormat::Jpeg => "jpeg",
            CompressFormat::Png => "png",
            CompressFormat::Webp => "webp",
        };
        f.write_str(name)
    }
}

impl FromStr for CompressFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(CompressFormat::Jpeg),
            "png" => Ok(CompressFormat::Png),
            "webp" => Ok(CompressFormat::Webp),
            other => Err(format!("unknown format '{other}' (expected jpeg, png or webp)")),
        }
    }
}

/// Infer the encoder for a file from its extension (case-insensitive).
///
/// Returns `None` for `heic`, which can be decoded by some platforms but
/// never re-encoded. Files without an extension, or with any other
/// extension, default to [`CompressFormat::Jpeg`].
pub fn compress_format(path: &Path) -> Option<CompressFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "png" => Some(CompressFormat::Png),
        "webp" => Some(CompressFormat::Webp),
        "heic" => None,
        _ => Some(CompressFormat::Jpeg),
    }
}
