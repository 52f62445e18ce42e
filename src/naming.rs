//! Filename resolution for content URIs.
//!
//! The display name reported by the [`ContentResolver`] wins whenever it is
//! present and not blank. Anything else (a failed lookup, no row, no name
//! column, an all-whitespace name) falls back to a generated name:
//!
//! ```text
//! IMG_<yyyyMMdd>_<nanos>.<ext>      e.g. IMG_20240315_1710489600123456789.jpg
//! ```
//!
//! The extension comes from the URI's MIME type and is limited to the three
//! encodable formats. An unmapped MIME type is the one fatal outcome.

use crate::content::ContentResolver;
use crate::imaging::CompressFormat;
use chrono::{DateTime, Local};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum NamingError {
    #[error("Cannot generate fallback filename for {} {uri}", mime.as_deref().unwrap_or("<no type>"))]
    UnmappedMimeType { mime: Option<String>, uri: String },
}

/// Resolve the filename to use for `uri`: display name first, generated
/// fallback second.
pub fn get_file_name(resolver: &impl ContentResolver, uri: &Url) -> Result<String, NamingError> {
    match resolver.query_display_name(uri) {
        Ok(Some(name)) if !name.trim().is_empty() => return Ok(name),
        Ok(_) => tracing::debug!(%uri, "No display name, generating fallback"),
        Err(e) => tracing::debug!(%uri, error = %e, "Display name lookup failed, generating fallback"),
    }
    fallback_file_name(resolver.get_type(uri).as_deref(), uri, Local::now())
}

/// Generate `IMG_<yyyyMMdd>_<nanos>.<ext>` for a URI of the given MIME type.
pub fn fallback_file_name(
    mime: Option<&str>,
    uri: &Url,
    now: DateTime<Local>,
) -> Result<String, NamingError> {
    let format = mime
        .and_then(CompressFormat::from_mime_type)
        .ok_or_else(|| NamingError::UnmappedMimeType {
            mime: mime.map(str::to_string),
            uri: uri.to_string(),
        })?;
    Ok(format!("{}.{}", fallback_stem(now), format.extension()))
}

fn fallback_stem(now: DateTime<Local>) -> String {
    let nanos = now.timestamp_nanos_opt().unwrap_or_default();
    format!("IMG_{}{}", now.format("%Y%m%d_"), nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MockResolver;
    use chrono::TimeZone;

    fn uri() -> Url {
        Url::parse("content://media/external/images/42").unwrap()
    }

    /// Check `IMG_<8 digits>_<digits>.<ext>`.
    fn assert_fallback_shape(name: &str, ext: &str) {
        let rest = name
            .strip_prefix("IMG_")
            .unwrap_or_else(|| panic!("{name} lacks IMG_ prefix"));
        let (stem, suffix) = rest.rsplit_once('.').unwrap();
        assert_eq!(suffix, ext);
        let (date, nanos) = stem.split_once('_').unwrap();
        assert_eq!(date.len(), 8, "{name}");
        assert!(date.chars().all(|c| c.is_ascii_digit()), "{name}");
        assert!(!nanos.is_empty());
        assert!(nanos.chars().all(|c| c.is_ascii_digit()), "{name}");
    }

    #[test]
    fn display_name_is_used_verbatim() {
        let resolver = MockResolver::new().with_entry(uri(), Some("My Photo.jpeg"), None, b"");

        assert_eq!(get_file_name(&resolver, &uri()).unwrap(), "My Photo.jpeg");
    }

    #[test]
    fn blank_display_name_falls_back() {
        let resolver =
            MockResolver::new().with_entry(uri(), Some("   "), Some("image/png"), b"");

        let name = get_file_name(&resolver, &uri()).unwrap();
        assert_fallback_shape(&name, "png");
    }

    #[test]
    fn missing_display_name_falls_back() {
        let resolver = MockResolver::new().with_entry(uri(), None, Some("image/jpg"), b"");

        let name = get_file_name(&resolver, &uri()).unwrap();
        assert_fallback_shape(&name, "jpg");
    }

    #[test]
    fn failed_lookup_falls_back() {
        let resolver = MockResolver::new().with_type_only(uri(), "image/webp");

        let name = get_file_name(&resolver, &uri()).unwrap();
        assert_fallback_shape(&name, "webp");
    }

    #[test]
    fn unmapped_mime_type_is_fatal() {
        let resolver = MockResolver::new().with_entry(uri(), None, Some("image/heic"), b"");

        let err = get_file_name(&resolver, &uri()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("image/heic"), "{msg}");
        assert!(msg.contains("content://media/external/images/42"), "{msg}");
    }

    #[test]
    fn unknown_type_is_fatal() {
        let resolver = MockResolver::new();

        let err = get_file_name(&resolver, &uri()).unwrap_err();
        assert!(matches!(err, NamingError::UnmappedMimeType { mime: None, .. }));
    }

    #[test]
    fn fallback_uses_date_and_timestamp() {
        let now = Local.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap();
        let name = fallback_file_name(Some("image/jpeg"), &uri(), now).unwrap();

        let expected_nanos = now.timestamp_nanos_opt().unwrap();
        assert_eq!(name, format!("IMG_20240315_{expected_nanos}.jpg"));
    }
}
