//! Image processing in pure Rust, no system codecs.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **EXIF orientation** | `kamadak-exif` |
//! | **Decode + downsample** | `image` decoders + `resize_exact` |
//! | **Encode** | JPEG / PNG / WebP encoders from `image` |
//!
//! The module is split into:
//! - **Format**: extension → [`CompressFormat`] inference
//! - **Calculations**: Pure functions for sample-size math (unit testable)
//! - **Parameters**: Data structures describing an encode
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Orientation**: EXIF tag → pixel rotation
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod format;
pub mod operations;
pub mod orientation;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{calculate_in_sample_size, sampled_dimensions};
pub use format::{CompressFormat, compress_format};
pub use operations::{
    decode_sampled_bitmap, default_params_for, get_dimensions, load_bitmap, overwrite,
    save_bitmap,
};
pub use orientation::{Rotation, apply_rotation, determine_image_rotation, rotation_for_exif};
pub use params::{EncodeParams, Quality};
pub use rust_backend::RustBackend;
