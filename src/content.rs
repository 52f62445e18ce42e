//! Content resolution: opaque URIs → byte streams and metadata.
//!
//! A [`ContentResolver`] answers three questions about a URI: what it
//! should be called, what MIME type it holds, and how to read it. The cache
//! copier and the filename resolver only ever talk to this trait, so the
//! source of the bytes (local files, a document provider, an in-memory fake
//! in tests) is interchangeable.
//!
//! [`FileContentResolver`] is the production implementation for `file://`
//! URIs.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("Unsupported URI scheme '{scheme}' in {uri}")]
    UnsupportedScheme { scheme: String, uri: String },
    #[error("Invalid URI: {0}")]
    InvalidUri(String),
    #[error("No content at {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Maps URIs to readable streams and queryable metadata.
pub trait ContentResolver: Sync {
    /// Look up the display name recorded for `uri`.
    ///
    /// `Ok(None)` means the lookup ran but produced no row or no name
    /// column. Callers treat both that and an error as "unknown".
    fn query_display_name(&self, uri: &Url) -> Result<Option<String>, ContentError>;

    /// MIME type of the content behind `uri`, if known.
    fn get_type(&self, uri: &Url) -> Option<String>;

    /// Open the content for reading.
    fn open_input(&self, uri: &Url) -> Result<Box<dyn Read + Send>, ContentError>;
}

/// Parse a user-supplied string as a URI.
pub fn parse_uri(input: &str) -> Result<Url, ContentError> {
    Url::parse(input).map_err(|e| ContentError::InvalidUri(format!("{input}: {e}")))
}

/// Build a `file://` URI for an absolute path.
pub fn file_uri(path: &Path) -> Result<Url, ContentError> {
    Url::from_file_path(path)
        .map_err(|()| ContentError::InvalidUri(format!("{} is not absolute", path.display())))
}

/// MIME type guessed from a file extension, for the image types this crate
/// deals with.
pub fn mime_type_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// Resolver for `file://` URIs backed by the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileContentResolver;

impl FileContentResolver {
    pub fn new() -> Self {
        Self
    }

    fn local_path(uri: &Url) -> Result<std::path::PathBuf, ContentError> {
        if uri.scheme() != "file" {
            return Err(ContentError::UnsupportedScheme {
                scheme: uri.scheme().to_string(),
                uri: uri.to_string(),
            });
        }
        uri.to_file_path()
            .map_err(|()| ContentError::InvalidUri(uri.to_string()))
    }
}

impl ContentResolver for FileContentResolver {
    fn query_display_name(&self, uri: &Url) -> Result<Option<String>, ContentError> {
        let path = Self::local_path(uri)?;
        if !path.is_file() {
            return Err(ContentError::NotFound(uri.to_string()));
        }
        Ok(path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()))
    }

    fn get_type(&self, uri: &Url) -> Option<String> {
        let path = Self::local_path(uri).ok()?;
        let ext = path.extension()?.to_str()?;
        mime_type_for_extension(ext).map(str::to_string)
    }

    fn open_input(&self, uri: &Url) -> Result<Box<dyn Read + Send>, ContentError> {
        let path = Self::local_path(uri)?;
        match File::open(&path) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ContentError::NotFound(uri.to_string()))
            }
            Err(e) => Err(ContentError::Io(e)),
        }
    }
}
