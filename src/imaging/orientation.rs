//! EXIF orientation normalization.
//!
//! Cameras often store pixels sideways and record the intended display
//! rotation in the EXIF `Orientation` tag. Decoded images are rotated here so
//! the pixel data itself is upright and the tag can be dropped on re-encode.
//!
//! Only the three pure rotations are applied:
//!
//! | Tag | Rotation (clockwise) |
//! |---|---|
//! | 6 | 90° |
//! | 3 | 180° |
//! | 8 | 270° |
//!
//! Every other value, including the mirrored variants and an absent tag
//! (reported as `0`), leaves the image untouched.

use super::backend::ImageBackend;
use image::DynamicImage;
use std::path::Path;

/// Clockwise rotation derived from an EXIF orientation tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }
}

/// Map a raw EXIF orientation tag to the rotation that makes it upright.
pub fn rotation_for_exif(orientation: u32) -> Rotation {
    match orientation {
        6 => Rotation::Cw90,
        3 => Rotation::Cw180,
        8 => Rotation::Cw270,
        _ => Rotation::None,
    }
}

/// Rotate `image` in pixel space.
pub fn apply_rotation(image: DynamicImage, rotation: Rotation) -> DynamicImage {
    match rotation {
        Rotation::None => image,
        Rotation::Cw90 => image.rotate90(),
        Rotation::Cw180 => image.rotate180(),
        Rotation::Cw270 => image.rotate270(),
    }
}

/// Read the orientation tag of `image_file` and return `image` rotated upright.
pub fn determine_image_rotation<B: ImageBackend + ?Sized>(
    backend: &B,
    image_file: &Path,
    image: DynamicImage,
) -> DynamicImage {
    let orientation = backend.read_orientation(image_file);
    let rotation = rotation_for_exif(orientation);
    if rotation != Rotation::None {
        tracing::debug!(
            path = %image_file.display(),
            orientation,
            degrees = rotation.degrees(),
            "Applying EXIF rotation"
        );
    }
    apply_rotation(image, rotation)
}
