//! # Compressor
//!
//! Image file helpers for shrinking photos before they are uploaded or
//! stored: bounded-memory decoding, EXIF rotation, scratch copies, and
//! re-encoding in place.
//!
//! # How a compression runs
//!
//! ```text
//! input file / file:// URI
//!     │  cache::CacheDir::copy_to_cache / copy_uri_to_cache
//!     ▼
//! <cache>/compressor/<name>          (working copy, the input is never touched)
//!     │  compress::Constraint::satisfy, repeated until is_satisfied
//!     ▼
//! decode (sampled) → rotate upright → encode (format, quality) → overwrite
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Format inference, sample-size math, EXIF rotation, decode/encode backend |
//! | [`content`] | [`ContentResolver`](content::ContentResolver): URIs → streams, display names, MIME types |
//! | [`naming`] | Display-name lookup with `IMG_<date>_<nanos>.<ext>` fallback |
//! | [`cache`] | Scratch directory for working copies, transient-file cleanup |
//! | [`compress`] | Constraint pipeline (resolution, quality, format, size, destination) |
//! | [`config`] | `compressor.toml` loading, defaults, and validation |
//!
//! # Design Decisions
//!
//! ## Decode Small, Not Resize Later
//!
//! Phone cameras produce images far larger than anything that gets
//! displayed. The loader reads only the header first and picks a
//! power-of-two sample size. JPEGs are then decoded directly at a reduced
//! DCT scale, so a 48 MP photo bound for a 612x816 slot is never held at
//! full size. PNG and WebP have no scaled decoder; they decode at full size
//! and are resized once.
//!
//! ## Upright Pixels
//!
//! Every loader applies the EXIF orientation to the pixel data. Encoders
//! here write no EXIF, so leaving the rotation in metadata would lose it.
//!
//! ## Free Functions Over a Backend Trait
//!
//! The helpers are plain functions taking an [`ImageBackend`](imaging::ImageBackend).
//! Tests swap in a recording mock; production uses the pure-Rust
//! [`RustBackend`](imaging::RustBackend).

pub mod cache;
pub mod compress;
pub mod config;
pub mod content;
pub mod imaging;
pub mod naming;

#[cfg(test)]
pub(crate) mod test_helpers;
