//! Content types and default bucket selection for uploaded files.

use std::path::Path;

use crate::config::BucketRole;

/// Content type used for extensions not in the table.
pub const FALLBACK_CONTENT_TYPE: &str = "binary/octet-stream";

const CONTENT_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    ("dcm", "application/dicom"),
    ("csv", "text/csv"),
    ("txt", "text/plain"),
    ("json", "application/json"),
];

/// Returns the content type for a file name, by lowercase extension.
pub fn content_type(file: &Path) -> &'static str {
    let Some(extension) = file.extension().and_then(|e| e.to_str()) else {
        return FALLBACK_CONTENT_TYPE;
    };
    let extension = extension.to_ascii_lowercase();

    CONTENT_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, ty)| *ty)
        .unwrap_or(FALLBACK_CONTENT_TYPE)
}

/// Picks the bucket role a file goes to when no bucket is given.
///
/// Images go to the images bucket; everything else, including unknown
/// types, goes to the data bucket.
pub fn default_role(file: &Path) -> BucketRole {
    if content_type(file).starts_with("image/") {
        BucketRole::Images
    } else {
        BucketRole::Data
    }
}
