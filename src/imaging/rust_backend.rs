//! Pure Rust codec backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::ImageReader::into_dimensions` (header only) |
//! | Decode (JPEG, PNG, WebP) | `image` crate (pure Rust decoders) |
//! | Sampled JPEG decode | `jpeg-decoder` DCT scaling (1/2, 1/4, 1/8) |
//! | Downsample (other formats) | `image::DynamicImage::resize_exact` with `Triangle` filter |
//! | EXIF orientation | `kamadak-exif` (`exif::Reader::read_from_container`) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality honoured) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (lossless) |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless only) |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::sampled_dimensions;
use super::format::CompressFormat;
use super::params::EncodeParams;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, ImageReader, RgbImage};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_error(path: &Path, err: impl std::fmt::Display) -> BackendError {
    BackendError::Decode {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

/// Open a reader that sniffs the format from the file's magic bytes rather
/// than trusting its extension.
fn open_reader(path: &Path) -> Result<ImageReader<BufReader<File>>, BackendError> {
    ImageReader::open(path)
        .map_err(|e| decode_error(path, e))?
        .with_guessed_format()
        .map_err(|e| decode_error(path, e))
}

/// Decode a JPEG at the smallest DCT scale (1/8, 1/4, 1/2 or 1) whose
/// output still covers `target`, so the full-resolution buffer is never
/// allocated.
///
/// Returns `None` when the stream needs the generic decoder instead:
/// CMYK or 16-bit samples, lossless coding, or any decoder error. The
/// generic path then reports the real failure.
fn decode_jpeg_scaled(path: &Path, target: Dimensions) -> Option<DynamicImage> {
    let file = File::open(path).ok()?;
    let mut decoder = jpeg_decoder::Decoder::new(BufReader::new(file));
    let (width, height) = decoder
        .scale(to_u16(target.width), to_u16(target.height))
        .ok()?;
    let pixels = decoder.decode().ok()?;
    let info = decoder.info()?;
    let (width, height) = (u32::from(width), u32::from(height));

    let image = match info.pixel_format {
        jpeg_decoder::PixelFormat::L8 => {
            DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, pixels)?)
        }
        jpeg_decoder::PixelFormat::RGB24 => {
            DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, pixels)?)
        }
        _ => return None,
    };
    tracing::debug!(
        path = %path.display(),
        width,
        height,
        "Decoded JPEG at reduced DCT scale"
    );
    Some(image)
}

// JPEG dimensions are 16-bit, so saturating here never loses a real size.
fn to_u16(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

fn resize_to(image: DynamicImage, target: Dimensions) -> DynamicImage {
    if image.width() == target.width && image.height() == target.height {
        return image;
    }
    image.resize_exact(target.width, target.height, FilterType::Triangle)
}

fn read_exif_orientation(path: &Path) -> Option<u32> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut reader).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    field.value.get_uint(0)
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = open_reader(path)?
            .into_dimensions()
            .map_err(|e| decode_error(path, e))?;
        Ok(Dimensions { width, height })
    }

    fn decode(&self, path: &Path, sample_size: u32) -> Result<DynamicImage, BackendError> {
        let reader = open_reader(path)?;

        if sample_size > 1 && reader.format() == Some(ImageFormat::Jpeg) {
            let target = sampled_dimensions(self.identify(path)?, sample_size);
            if let Some(scaled) = decode_jpeg_scaled(path, target) {
                return Ok(resize_to(scaled, target));
            }
        }

        let img = reader.decode().map_err(|e| decode_error(path, e))?;
        if sample_size <= 1 {
            return Ok(img);
        }
        let target = sampled_dimensions(
            Dimensions {
                width: img.width(),
                height: img.height(),
            },
            sample_size,
        );
        Ok(resize_to(img, target))
    }

    fn read_orientation(&self, path: &Path) -> u32 {
        read_exif_orientation(path).unwrap_or(0)
    }

    fn encode(
        &self,
        image: &DynamicImage,
        writer: &mut dyn Write,
        params: EncodeParams,
    ) -> Result<(), BackendError> {
        let result = match params.format {
            CompressFormat::Jpeg => {
                // JPEG has no alpha channel and the encoder rejects quality 0.
                let quality = params.quality.value().max(1);
                let encoder = JpegEncoder::new_with_quality(writer, quality);
                DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)
            }
            CompressFormat::Png => image.write_with_encoder(PngEncoder::new(writer)),
            CompressFormat::Webp => {
                let encoder = WebPEncoder::new_lossless(writer);
                if image.color().has_alpha() {
                    DynamicImage::ImageRgba8(image.to_rgba8()).write_with_encoder(encoder)
                } else {
                    DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)
                }
            }
        };
        result.map_err(|e| BackendError::Encode(format!("{} encode failed: {}", params.format, e)))
    }
}
