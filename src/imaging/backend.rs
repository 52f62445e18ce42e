//! Image codec backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the four operations every backend must
//! support: identify, decode, read_orientation, and encode.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend): the `image` crate for
//! pixels and `kamadak-exif` for the orientation tag.

use super::params::EncodeParams;
use image::DynamicImage;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to load bitmap from {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },
    #[error("Encoding failed: {0}")]
    Encode(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image codec backends.
///
/// Every backend must implement all four operations so the helpers in
/// [`operations`](super::operations) stay backend-agnostic.
pub trait ImageBackend: Sync {
    /// Read the image dimensions from the header only, without decoding pixels.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode the image, downsampled by `sample_size` (1 = full size).
    fn decode(&self, path: &Path, sample_size: u32) -> Result<DynamicImage, BackendError>;

    /// Raw EXIF orientation tag, `0` when absent or unreadable.
    fn read_orientation(&self, path: &Path) -> u32;

    /// Encode `image` into `writer`.
    fn encode(
        &self,
        image: &DynamicImage,
        writer: &mut dyn Write,
        params: EncodeParams,
    ) -> Result<(), BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::sync::Mutex;

    /// Mock backend that records operations and fabricates images.
    /// Uses Mutex (not RefCell) so it is Sync like the trait requires.
    #[derive(Default)]
    pub struct MockBackend {
        pub dimensions: Mutex<Option<Dimensions>>,
        pub orientation: u32,
        pub fail_encode: bool,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        Decode { path: String, sample_size: u32 },
        ReadOrientation(String),
        Encode { width: u32, height: u32, params: EncodeParams },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_dimensions(width: u32, height: u32) -> Self {
            Self {
                dimensions: Mutex::new(Some(Dimensions { width, height })),
                ..Self::default()
            }
        }

        pub fn with_orientation(mut self, orientation: u32) -> Self {
            self.orientation = orientation;
            self
        }

        /// Make `encode` write a few bytes and then fail.
        pub fn with_failing_encode(mut self) -> Self {
            self.fail_encode = true;
            self
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        fn record(&self, op: RecordedOp) {
            self.operations.lock().unwrap().push(op);
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.record(RecordedOp::Identify(path.to_string_lossy().to_string()));
            self.dimensions
                .lock()
                .unwrap()
                .ok_or_else(|| BackendError::Decode {
                    path: path.to_path_buf(),
                    message: "no mock dimensions".to_string(),
                })
        }

        fn decode(&self, path: &Path, sample_size: u32) -> Result<DynamicImage, BackendError> {
            self.record(RecordedOp::Decode {
                path: path.to_string_lossy().to_string(),
                sample_size,
            });
            let dims = self.identify(path)?;
            let sampled = crate::imaging::calculations::sampled_dimensions(dims, sample_size);
            Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
                sampled.width,
                sampled.height,
                Rgb([10, 20, 30]),
            )))
        }

        fn read_orientation(&self, path: &Path) -> u32 {
            self.record(RecordedOp::ReadOrientation(
                path.to_string_lossy().to_string(),
            ));
            self.orientation
        }

        fn encode(
            &self,
            image: &DynamicImage,
            writer: &mut dyn Write,
            params: EncodeParams,
        ) -> Result<(), BackendError> {
            self.record(RecordedOp::Encode {
                width: image.width(),
                height: image.height(),
                params,
            });
            if self.fail_encode {
                writer.write_all(b"partial")?;
                return Err(BackendError::Encode("mock encoder failure".to_string()));
            }
            writer.write_all(b"mock")?;
            Ok(())
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::with_dimensions(800, 600);

        let result = backend.identify(Path::new("/test/image.jpg")).unwrap();
        assert_eq!(result.width, 800);
        assert_eq!(result.height, 600);

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p == "/test/image.jpg"));
    }

    #[test]
    fn mock_decode_honours_sample_size() {
        let backend = MockBackend::with_dimensions(800, 600);
        let img = backend.decode(Path::new("/a.jpg"), 4).unwrap();
        assert_eq!((img.width(), img.height()), (200, 150));
    }

    #[test]
    fn mock_without_dimensions_fails_decode_with_path() {
        let backend = MockBackend::new();
        let err = backend.decode(Path::new("/broken.jpg"), 1).unwrap_err();
        assert!(err.to_string().contains("/broken.jpg"));
    }
}
