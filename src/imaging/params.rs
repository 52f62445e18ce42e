//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! and the [`backend`](super::backend) that does the pixel work.
//!
//! ## Types
//!
//! - [`Quality`]: Encoding quality (0–100, default 100). Clamped on construction.
//! - [`EncodeParams`]: Target format and quality for a single encode.

use super::format::CompressFormat;
use serde::{Deserialize, Serialize};

/// Quality setting for image encoding (0-100).
///
/// Lossless encoders (PNG, and WebP with the pure-Rust encoder) ignore it.
/// Every constructor clamps, deserialization included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.min(100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl From<u32> for Quality {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Quality> for u32 {
    fn from(quality: Quality) -> Self {
        u32::from(quality.0)
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(100)
    }
}

/// Parameters for a single encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodeParams {
    pub format: CompressFormat,
    pub quality: Quality,
}

impl EncodeParams {
    pub fn new(format: CompressFormat, quality: Quality) -> Self {
        Self { format, quality }
    }
}
