//! Error types for talking to the blog backend.

use miette::Diagnostic;

use crate::upload::UploadRejection;

/// Errors surfaced by `BlogApi` implementations.
#[derive(thiserror::Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum ApiError {
    /// Transport-level failure (connection refused, timeout, bad TLS...).
    #[error(transparent)]
    #[diagnostic(code(quill::api::http))]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success HTTP status.
    #[error("server returned {status}: {body}")]
    #[diagnostic(code(quill::api::status))]
    Status { status: u16, body: String },

    /// Server answered 2xx but reported `success: false`.
    #[error("server rejected request: {0}")]
    #[diagnostic(code(quill::api::rejected))]
    Rejected(String),

    /// File failed local validation; nothing was sent.
    #[error(transparent)]
    #[diagnostic(code(quill::api::invalid_upload))]
    InvalidUpload(#[from] UploadRejection),

    /// A URL could not be parsed or did not have the expected shape.
    #[error("invalid URL: {0}")]
    #[diagnostic(code(quill::api::url))]
    InvalidUrl(String),

    #[error(transparent)]
    #[diagnostic(code(quill::api::json))]
    Json(#[from] serde_json::Error),
}

impl From<url::ParseError> for ApiError {
    fn from(e: url::ParseError) -> Self {
        ApiError::InvalidUrl(e.to_string())
    }
}
