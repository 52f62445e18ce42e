//! Constraint-driven compression.
//!
//! A compression run works on a cache copy of the input and applies a list
//! of [`Constraint`]s in order. Each constraint is driven to completion
//! before the next one starts:
//!
//! ```text
//! file = cache.copy_to_cache(input)
//! for constraint in constraints:
//!     while !constraint.is_satisfied(file):
//!         file = constraint.satisfy(file)
//! ```
//!
//! `satisfy` may return a different path than it was given: re-encoding to
//! another format renames the file, and the destination constraint copies it
//! elsewhere. With no constraints at all, the [`DefaultConstraint`] applies.

use crate::cache::{CacheDir, CacheError};
use crate::config::{DefaultsConfig, SizeConfig};
use crate::content::ContentResolver;
use crate::imaging::{
    BackendError, CompressFormat, EncodeParams, ImageBackend, Quality, calculate_in_sample_size,
    compress_format, decode_sampled_bitmap, default_params_for, load_bitmap, overwrite,
};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum CompressError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One requirement on the compressed file.
pub trait Constraint: Send {
    fn is_satisfied(&self, image_file: &Path, backend: &dyn ImageBackend) -> bool;

    /// Move `image_file` closer to satisfying this constraint and return
    /// the path now holding the image.
    fn satisfy(
        &mut self,
        image_file: &Path,
        backend: &dyn ImageBackend,
    ) -> Result<PathBuf, CompressError>;
}

/// Sampled decode to the bounds, re-encoded once with the given format and
/// quality.
#[derive(Debug, Clone)]
pub struct DefaultConstraint {
    pub width: u32,
    pub height: u32,
    pub format: CompressFormat,
    pub quality: Quality,
    resolved: bool,
}

impl DefaultConstraint {
    pub fn new(width: u32, height: u32, format: CompressFormat, quality: Quality) -> Self {
        Self {
            width,
            height,
            format,
            quality,
            resolved: false,
        }
    }

    pub fn from_config(defaults: &DefaultsConfig) -> Self {
        Self::new(
            defaults.width,
            defaults.height,
            defaults.format,
            Quality::new(defaults.quality),
        )
    }
}

impl Default for DefaultConstraint {
    fn default() -> Self {
        Self::from_config(&DefaultsConfig::default())
    }
}

impl Constraint for DefaultConstraint {
    fn is_satisfied(&self, _image_file: &Path, _backend: &dyn ImageBackend) -> bool {
        self.resolved
    }

    fn satisfy(
        &mut self,
        image_file: &Path,
        backend: &dyn ImageBackend,
    ) -> Result<PathBuf, CompressError> {
        let image = decode_sampled_bitmap(backend, image_file, self.width, self.height)?;
        let result = overwrite(
            backend,
            image_file,
            &image,
            EncodeParams::new(self.format, self.quality),
        )?;
        self.resolved = true;
        Ok(result)
    }
}

/// Downsample until no power-of-two reduction fits inside the bounds.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionConstraint {
    pub width: u32,
    pub height: u32,
}

impl Constraint for ResolutionConstraint {
    fn is_satisfied(&self, image_file: &Path, backend: &dyn ImageBackend) -> bool {
        match backend.identify(image_file) {
            Ok(bounds) => calculate_in_sample_size(bounds, self.width, self.height) <= 1,
            // Unreadable files surface their error from the next decode.
            Err(_) => true,
        }
    }

    fn satisfy(
        &mut self,
        image_file: &Path,
        backend: &dyn ImageBackend,
    ) -> Result<PathBuf, CompressError> {
        let image = decode_sampled_bitmap(backend, image_file, self.width, self.height)?;
        Ok(overwrite(
            backend,
            image_file,
            &image,
            default_params_for(image_file),
        )?)
    }
}

/// Re-encode once at the given quality, keeping the file's format.
#[derive(Debug, Clone, Copy)]
pub struct QualityConstraint {
    pub quality: Quality,
    resolved: bool,
}

impl QualityConstraint {
    pub fn new(quality: Quality) -> Self {
        Self {
            quality,
            resolved: false,
        }
    }
}

impl Constraint for QualityConstraint {
    fn is_satisfied(&self, _image_file: &Path, _backend: &dyn ImageBackend) -> bool {
        self.resolved
    }

    fn satisfy(
        &mut self,
        image_file: &Path,
        backend: &dyn ImageBackend,
    ) -> Result<PathBuf, CompressError> {
        let image = load_bitmap(backend, image_file)?;
        let params = EncodeParams {
            quality: self.quality,
            ..default_params_for(image_file)
        };
        let result = overwrite(backend, image_file, &image, params)?;
        self.resolved = true;
        Ok(result)
    }
}

/// Re-encode into `format` unless the file already has it.
#[derive(Debug, Clone, Copy)]
pub struct FormatConstraint {
    pub format: CompressFormat,
}

impl Constraint for FormatConstraint {
    fn is_satisfied(&self, image_file: &Path, _backend: &dyn ImageBackend) -> bool {
        compress_format(image_file) == Some(self.format)
    }

    fn satisfy(
        &mut self,
        image_file: &Path,
        backend: &dyn ImageBackend,
    ) -> Result<PathBuf, CompressError> {
        let image = load_bitmap(backend, image_file)?;
        Ok(overwrite(
            backend,
            image_file,
            &image,
            EncodeParams::new(self.format, Quality::default()),
        )?)
    }
}

/// Lower the quality step by step until the file fits in `max_file_size`
/// bytes or the attempts run out.
#[derive(Debug, Clone)]
pub struct SizeConstraint {
    pub max_file_size: u64,
    pub step_size: u32,
    pub max_iteration: u32,
    pub min_quality: u32,
    iteration: u32,
}

impl SizeConstraint {
    pub fn new(max_file_size: u64) -> Self {
        Self::from_config(max_file_size, &SizeConfig::default())
    }

    pub fn from_config(max_file_size: u64, size: &SizeConfig) -> Self {
        Self {
            max_file_size,
            step_size: size.step_size,
            max_iteration: size.max_iteration,
            min_quality: size.min_quality,
            iteration: 0,
        }
    }

    /// Quality used by the attempt numbered `iteration` (1-based).
    pub fn quality_for_iteration(&self, iteration: u32) -> Quality {
        let stepped = 100u32.saturating_sub(iteration.saturating_mul(self.step_size));
        Quality::new(stepped.max(self.min_quality))
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }
}

impl Constraint for SizeConstraint {
    fn is_satisfied(&self, image_file: &Path, _backend: &dyn ImageBackend) -> bool {
        let fits = fs::metadata(image_file)
            .map(|m| m.len() <= self.max_file_size)
            .unwrap_or(false);
        fits || self.iteration >= self.max_iteration
    }

    fn satisfy(
        &mut self,
        image_file: &Path,
        backend: &dyn ImageBackend,
    ) -> Result<PathBuf, CompressError> {
        self.iteration += 1;
        let quality = self.quality_for_iteration(self.iteration);
        tracing::debug!(
            path = %image_file.display(),
            iteration = self.iteration,
            quality = quality.value(),
            "Shrinking to fit size limit"
        );
        let image = load_bitmap(backend, image_file)?;
        let params = EncodeParams {
            quality,
            ..default_params_for(image_file)
        };
        Ok(overwrite(backend, image_file, &image, params)?)
    }
}

/// Copy the result to a fixed destination path, replacing any file there.
#[derive(Debug, Clone)]
pub struct DestinationConstraint {
    pub destination: PathBuf,
}

impl Constraint for DestinationConstraint {
    fn is_satisfied(&self, image_file: &Path, _backend: &dyn ImageBackend) -> bool {
        image_file == self.destination
    }

    fn satisfy(
        &mut self,
        image_file: &Path,
        _backend: &dyn ImageBackend,
    ) -> Result<PathBuf, CompressError> {
        if let Some(parent) = self.destination.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::copy(image_file, &self.destination)?;
        Ok(self.destination.clone())
    }
}

/// Ordered list of constraints for one compression run.
#[derive(Default)]
pub struct Compression {
    constraints: Vec<Box<dyn Constraint>>,
}

impl Compression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constraint(mut self, constraint: impl Constraint + 'static) -> Self {
        self.constraints.push(Box::new(constraint));
        self
    }

    pub fn default_constraint(
        self,
        width: u32,
        height: u32,
        format: CompressFormat,
        quality: Quality,
    ) -> Self {
        self.constraint(DefaultConstraint::new(width, height, format, quality))
    }

    pub fn resolution(self, width: u32, height: u32) -> Self {
        self.constraint(ResolutionConstraint { width, height })
    }

    pub fn quality(self, quality: Quality) -> Self {
        self.constraint(QualityConstraint::new(quality))
    }

    pub fn format(self, format: CompressFormat) -> Self {
        self.constraint(FormatConstraint { format })
    }

    pub fn size(self, max_file_size: u64) -> Self {
        self.constraint(SizeConstraint::new(max_file_size))
    }

    pub fn destination(self, destination: impl Into<PathBuf>) -> Self {
        self.constraint(DestinationConstraint {
            destination: destination.into(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Drive every constraint to completion on `image_file`, in order.
    pub fn run(
        mut self,
        backend: &dyn ImageBackend,
        image_file: PathBuf,
    ) -> Result<PathBuf, CompressError> {
        if self.constraints.is_empty() {
            self.constraints.push(Box::new(DefaultConstraint::default()));
        }
        let mut result = image_file;
        for constraint in &mut self.constraints {
            while !constraint.is_satisfied(&result, backend) {
                result = constraint.satisfy(&result, backend)?;
            }
        }
        Ok(result)
    }
}

/// Compress a cache copy of `image_file`. The original is never modified.
pub fn compress(
    backend: &dyn ImageBackend,
    cache: &CacheDir,
    image_file: &Path,
    compression: Compression,
) -> Result<PathBuf, CompressError> {
    let working = cache.copy_to_cache(image_file)?;
    tracing::info!(source = %image_file.display(), "Compressing");
    compression.run(backend, working)
}

/// Like [`compress`], with the working copy placed at `relative` under the
/// cache. Files that share a name but not a `relative` path can be
/// compressed concurrently.
pub fn compress_as(
    backend: &dyn ImageBackend,
    cache: &CacheDir,
    image_file: &Path,
    relative: &Path,
    compression: Compression,
) -> Result<PathBuf, CompressError> {
    let working = cache.copy_to_cache_as(image_file, relative)?;
    tracing::info!(source = %image_file.display(), "Compressing");
    compression.run(backend, working)
}

/// Compress the content behind `uri`, materialized into the cache first.
///
/// Working files stay in the cache only as long as `cache` lives, including
/// one renamed by a format change. Add a destination constraint to keep
/// the result.
pub fn compress_uri(
    backend: &dyn ImageBackend,
    cache: &CacheDir,
    resolver: &impl ContentResolver,
    uri: &Url,
    compression: Compression,
) -> Result<PathBuf, CompressError> {
    let working = cache.copy_uri_to_cache(resolver, uri)?;
    tracing::info!(%uri, "Compressing");
    let result = compression.run(backend, working)?;
    // A format change renames the working copy; the new name is transient too.
    if result.starts_with(cache.path()) {
        cache.delete_on_drop(&result);
    }
    Ok(result)
}
