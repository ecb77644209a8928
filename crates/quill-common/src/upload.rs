//! Image upload rules shared by the editor (checked before sending) and the
//! server (checked again on receipt).

use bytes::Bytes;
use miette::Diagnostic;
use mime_sniffer::MimeTypeSniffer;

/// Upload size ceiling: 5 MiB.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// MIME types the image store accepts.
pub const ALLOWED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

const FALLBACK_EXTENSION: &str = "jpg";

/// Why a file was refused before it reached storage.
#[derive(thiserror::Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UploadRejection {
    #[error("invalid file type {0:?}. Only JPEG, PNG, GIF, and WebP are allowed.")]
    #[diagnostic(code(quill::upload::file_type))]
    UnsupportedType(String),

    #[error("file too large ({size} bytes). Maximum size is 5MB.")]
    #[diagnostic(code(quill::upload::too_large))]
    TooLarge { size: usize },

    #[error("no file provided")]
    #[diagnostic(code(quill::upload::missing))]
    Missing,
}

/// Check a declared type and size against the allow-list and ceiling.
pub fn validate_image(mime_type: &str, size: usize) -> Result<(), UploadRejection> {
    if !ALLOWED_IMAGE_TYPES.contains(&mime_type) {
        return Err(UploadRejection::UnsupportedType(mime_type.to_string()));
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(UploadRejection::TooLarge { size });
    }
    Ok(())
}

/// Declared type, unless it is missing or generic, in which case the bytes decide.
pub fn effective_mime_type(declared: &str, data: &Bytes) -> String {
    if !declared.is_empty() && declared != "application/octet-stream" {
        return declared.to_string();
    }
    data.sniff_mime_type()
        .map(str::to_string)
        .unwrap_or_else(|| declared.to_string())
}

/// Extension used for the stored object name.
pub fn extension_for(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && !ext.contains('/') => ext,
        _ => FALLBACK_EXTENSION,
    }
}
