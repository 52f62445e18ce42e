//! Shared test utilities for the compressor test suite.
//!
//! Provides synthetic image writers (plain JPEG/PNG, and JPEG carrying an
//! EXIF orientation tag) and an in-memory [`ContentResolver`].
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let path = tmp.path().join("sideways.jpg");
//! create_jpeg_with_orientation(&path, 60, 20, 6);
//!
//! let resolver = MockResolver::new()
//!     .with_entry(uri, Some("beach.png"), Some("image/png"), b"bytes");
//! ```

use crate::content::{ContentError, ContentResolver};
use image::{ImageEncoder, RgbImage};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;
use url::Url;

// =========================================================================
// Synthetic images
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

fn encode_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// Write a small valid JPEG file with the given dimensions.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    std::fs::write(path, encode_jpeg(width, height)).unwrap();
}

/// Write a small valid PNG file with the given dimensions.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    gradient(width, height).save_with_format(path, image::ImageFormat::Png).unwrap();
}

/// Write a JPEG whose pixels are `width` x `height` and whose EXIF
/// orientation tag is `orientation`.
///
/// The EXIF block is a big-endian TIFF structure with a single IFD0 entry,
/// spliced in as an APP1 segment right after the SOI marker.
pub fn create_jpeg_with_orientation(path: &Path, width: u32, height: u32, orientation: u16) {
    let jpeg = encode_jpeg(width, height);
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "encoder must start with SOI");

    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"MM\x00\x2A");
    tiff.extend_from_slice(&8u32.to_be_bytes()); // IFD0 offset
    tiff.extend_from_slice(&1u16.to_be_bytes()); // entry count
    tiff.extend_from_slice(&0x0112u16.to_be_bytes()); // Orientation
    tiff.extend_from_slice(&3u16.to_be_bytes()); // SHORT
    tiff.extend_from_slice(&1u32.to_be_bytes()); // count
    tiff.extend_from_slice(&orientation.to_be_bytes());
    tiff.extend_from_slice(&[0, 0]); // value padding
    tiff.extend_from_slice(&0u32.to_be_bytes()); // no next IFD

    let mut app1 = Vec::new();
    app1.extend_from_slice(b"Exif\x00\x00");
    app1.extend_from_slice(&tiff);

    let mut out = Vec::with_capacity(jpeg.len() + app1.len() + 4);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&((app1.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&app1);
    out.extend_from_slice(&jpeg[2..]);
    std::fs::write(path, out).unwrap();
}

// =========================================================================
// In-memory content resolver
// =========================================================================

struct MockEntry {
    /// `None` makes the display-name query fail outright.
    display_name: Option<Option<String>>,
    mime: Option<String>,
    bytes: Option<Vec<u8>>,
}

/// Content resolver serving canned answers keyed by URI.
///
/// Unknown URIs fail every query and report no MIME type.
#[derive(Default)]
pub struct MockResolver {
    entries: HashMap<String, MockEntry>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register readable content with an optional display name and type.
    pub fn with_entry(
        mut self,
        uri: Url,
        display_name: Option<&str>,
        mime: Option<&str>,
        bytes: &[u8],
    ) -> Self {
        self.entries.insert(
            uri.to_string(),
            MockEntry {
                display_name: Some(display_name.map(str::to_string)),
                mime: mime.map(str::to_string),
                bytes: Some(bytes.to_vec()),
            },
        );
        self
    }

    /// Register a URI whose name query errors and whose content cannot be
    /// opened, but whose MIME type is known.
    pub fn with_type_only(mut self, uri: Url, mime: &str) -> Self {
        self.entries.insert(
            uri.to_string(),
            MockEntry {
                display_name: None,
                mime: Some(mime.to_string()),
                bytes: None,
            },
        );
        self
    }
}

impl ContentResolver for MockResolver {
    fn query_display_name(&self, uri: &Url) -> Result<Option<String>, ContentError> {
        self.entries
            .get(uri.as_str())
            .and_then(|e| e.display_name.clone())
            .ok_or_else(|| ContentError::NotFound(uri.to_string()))
    }

    fn get_type(&self, uri: &Url) -> Option<String> {
        self.entries.get(uri.as_str()).and_then(|e| e.mime.clone())
    }

    fn open_input(&self, uri: &Url) -> Result<Box<dyn Read + Send>, ContentError> {
        let bytes = self
            .entries
            .get(uri.as_str())
            .and_then(|e| e.bytes.clone())
            .ok_or_else(|| ContentError::NotFound(uri.to_string()))?;
        Ok(Box::new(Cursor::new(bytes)))
    }
}
