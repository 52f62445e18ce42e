//! High-level image operations.
//!
//! These functions combine calculations with backend execution: they read
//! dimensions, pick a sample size, decode, rotate upright, and write encoded
//! output back to disk.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::calculate_in_sample_size;
use super::format::{CompressFormat, compress_format};
use super::orientation::determine_image_rotation;
use super::params::{EncodeParams, Quality};
use image::DynamicImage;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the backend, without decoding pixels.
pub fn get_dimensions<B: ImageBackend + ?Sized>(backend: &B, path: &Path) -> Result<Dimensions> {
    backend.identify(path)
}

/// Encode parameters implied by a destination path: its inferred format
/// (JPEG when none can be inferred) at full quality.
pub fn default_params_for(path: &Path) -> EncodeParams {
    EncodeParams::new(
        compress_format(path).unwrap_or(CompressFormat::Jpeg),
        Quality::default(),
    )
}

/// Decode `image_file` at full size and rotate it upright.
///
/// Fails with [`BackendError::Decode`] naming the file when it cannot be
/// decoded.
pub fn load_bitmap<B: ImageBackend + ?Sized>(
    backend: &B,
    image_file: &Path,
) -> Result<DynamicImage> {
    let loaded = backend.decode(image_file, 1)?;
    Ok(determine_image_rotation(backend, image_file, loaded))
}

/// Decode `image_file` downsampled so that it still covers
/// `req_width` x `req_height`, then rotate it upright.
///
/// Only the header is read first; the pixel decode happens once, already
/// knowing the sample size.
pub fn decode_sampled_bitmap<B: ImageBackend + ?Sized>(
    backend: &B,
    image_file: &Path,
    req_width: u32,
    req_height: u32,
) -> Result<DynamicImage> {
    let bounds = backend.identify(image_file)?;
    let sample_size = calculate_in_sample_size(bounds, req_width, req_height);
    tracing::debug!(
        path = %image_file.display(),
        width = bounds.width,
        height = bounds.height,
        req_width,
        req_height,
        sample_size,
        "Decoding sampled bitmap"
    );
    let decoded = backend.decode(image_file, sample_size)?;
    Ok(determine_image_rotation(backend, image_file, decoded))
}

/// Encode `image` to `destination`, creating parent directories as needed.
///
/// The writer is flushed whether or not encoding succeeded, and the file
/// handle is closed before returning. An encoding error takes precedence
/// over a flush error.
pub fn save_bitmap<B: ImageBackend + ?Sized>(
    backend: &B,
    image: &DynamicImage,
    destination: &Path,
    params: EncodeParams,
) -> Result<()> {
    if let Some(parent) = destination.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let file = fs::File::create(destination)?;
    let mut writer = BufWriter::new(file);
    let encoded = backend.encode(image, &mut writer, params);
    let flushed = writer.flush();
    drop(writer);

    encoded?;
    flushed?;
    Ok(())
}

/// Replace `image_file` with `image` encoded as `params.format`.
///
/// When the format matches the one inferred from the file's extension, the
/// file is rewritten in place. Otherwise the original is deleted and the
/// image is written next to it with the format's canonical extension
/// (`photo.png` → `photo.jpg`). Returns the path that now holds the image.
pub fn overwrite<B: ImageBackend + ?Sized>(
    backend: &B,
    image_file: &Path,
    image: &DynamicImage,
    params: EncodeParams,
) -> Result<PathBuf> {
    let result = if compress_format(image_file) == Some(params.format) {
        image_file.to_path_buf()
    } else {
        image_file.with_extension(params.format.extension())
    };

    if result != image_file {
        tracing::debug!(
            from = %image_file.display(),
            to = %result.display(),
            "Re-encoding to new format"
        );
    }

    match fs::remove_file(image_file) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %image_file.display(), error = %e, "Could not delete original");
        }
    }

    save_bitmap(backend, image, &result, params)?;
    Ok(result)
}
