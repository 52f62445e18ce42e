//! Scratch copies of source images.
//!
//! Every compression works on a copy, never on the caller's file. Copies
//! live in `<root>/compressor/`, where `<root>` is the system cache
//! directory unless configured otherwise.
//!
//! # Lifetime
//!
//! The directory is not indexed and has no eviction policy. Files are simply
//! overwritten when a copy with the same name is made again. Copies
//! materialized from URIs are additionally registered as *transient*: the
//! [`CacheDir`] deletes them, best effort, when it is dropped.
//! [`compress_uri`](crate::compress::compress_uri) registers the final
//! working file as well, since a format change renames it. The binary
//! keeps one `CacheDir` alive for the whole run, which makes that
//! "delete on exit".
//!
//! # Concurrency
//!
//! Nothing coordinates two copies that resolve to the same name; the last
//! writer wins. Callers that copy many files at once keep them apart with
//! [`CacheDir::copy_to_cache_as`] and a distinct relative path per file.

use crate::content::{ContentError, ContentResolver};
use crate::naming::{NamingError, get_file_name};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use url::Url;

/// Name of the directory created under the cache root.
pub const CACHE_SUBDIR: &str = "compressor";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Naming(#[from] NamingError),
    #[error("Not a file: {}", .0.display())]
    InvalidSource(PathBuf),
    #[error("Cache path escapes the cache directory: {}", .0.display())]
    InvalidCachePath(PathBuf),
}

/// Process-owned scratch directory for working copies.
#[derive(Debug)]
pub struct CacheDir {
    path: PathBuf,
    transient: Mutex<Vec<PathBuf>>,
}

impl CacheDir {
    /// Cache rooted at `root`; copies go to `root/compressor/`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            path: root.as_ref().join(CACHE_SUBDIR),
            transient: Mutex::new(Vec::new()),
        }
    }

    /// Cache under the platform cache directory (`~/.cache` on Linux),
    /// falling back to the temp directory.
    pub fn system_default() -> Self {
        Self::new(dirs::cache_dir().unwrap_or_else(std::env::temp_dir))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy `image_file` into the cache, replacing any previous copy with
    /// the same file name.
    pub fn copy_to_cache(&self, image_file: &Path) -> Result<PathBuf, CacheError> {
        let name = image_file
            .file_name()
            .ok_or_else(|| CacheError::InvalidSource(image_file.to_path_buf()))?;
        self.copy_to_cache_as(image_file, Path::new(name))
    }

    /// Copy `image_file` to `relative` under the cache, creating
    /// intermediate directories. `relative` must stay inside the cache: no
    /// root, no `..`.
    pub fn copy_to_cache_as(
        &self,
        image_file: &Path,
        relative: &Path,
    ) -> Result<PathBuf, CacheError> {
        if !image_file.is_file() {
            return Err(CacheError::InvalidSource(image_file.to_path_buf()));
        }
        if !is_contained(relative) {
            return Err(CacheError::InvalidCachePath(relative.to_path_buf()));
        }
        let cache_file = self.path.join(relative);
        if let Some(parent) = cache_file.parent() {
            fs::create_dir_all(parent)?;
        }

        // Copying a file onto itself would truncate it.
        if is_same_file(image_file, &cache_file) {
            return Ok(cache_file);
        }

        fs::copy(image_file, &cache_file)?;
        tracing::debug!(
            from = %image_file.display(),
            to = %cache_file.display(),
            "Copied file to cache"
        );
        Ok(cache_file)
    }

    /// Materialize the content behind `uri` as a cache file named by
    /// [`get_file_name`]. Any existing file with that name is replaced, and
    /// the new file is registered for cleanup when this `CacheDir` drops.
    pub fn copy_uri_to_cache(
        &self,
        resolver: &impl ContentResolver,
        uri: &Url,
    ) -> Result<PathBuf, CacheError> {
        let name = sanitize_file_name(&get_file_name(resolver, uri)?);
        let cache_file = self.path.join(name);
        fs::create_dir_all(&self.path)?;
        match fs::remove_file(&cache_file) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut input = resolver.open_input(uri)?;
        let file = fs::File::create(&cache_file)?;
        self.delete_on_drop(&cache_file);

        let mut output = BufWriter::new(file);
        let bytes = io::copy(&mut input, &mut output)?;
        output.flush()?;

        tracing::debug!(%uri, to = %cache_file.display(), bytes, "Copied content to cache");
        Ok(cache_file)
    }

    /// Register `path` for deletion when this cache is dropped.
    pub fn delete_on_drop(&self, path: &Path) {
        if let Ok(mut transient) = self.transient.lock() {
            transient.push(path.to_path_buf());
        }
    }

    /// Delete every registered transient file that still exists. Returns
    /// how many were removed. Failures are logged, never raised.
    pub fn cleanup(&self) -> usize {
        let paths = match self.transient.lock() {
            Ok(mut transient) => std::mem::take(&mut *transient),
            Err(_) => return 0,
        };
        let mut removed = 0;
        for path in paths {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Could not remove cache file");
                }
            }
        }
        removed
    }

    /// Remove the whole cache directory.
    pub fn clear(&self) -> Result<(), CacheError> {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for CacheDir {
    fn drop(&mut self) {
        let removed = self.cleanup();
        if removed > 0 {
            tracing::debug!(removed, "Removed transient cache files");
        }
    }
}

/// True when `relative` names something below the directory it is joined to.
fn is_contained(relative: &Path) -> bool {
    let mut components = relative.components().peekable();
    components.peek().is_some()
        && components.all(|c| matches!(c, std::path::Component::Normal(_)))
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Keep a display name from escaping the cache directory.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "." | ".." => cleaned.replace('.', "_"),
        _ => cleaned,
    }
}
