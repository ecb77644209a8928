use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use miette::Diagnostic;
use quill_common::{SaveResponse, UploadRejection};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ServerError {
    #[error("{0} not found")]
    #[diagnostic(code(quill::server::not_found))]
    NotFound(String),

    #[error(transparent)]
    #[diagnostic(code(quill::server::upload))]
    InvalidUpload(#[from] UploadRejection),

    #[error("malformed upload: {0}")]
    #[diagnostic(code(quill::server::multipart))]
    Multipart(#[from] MultipartError),

    #[error("storage error")]
    #[diagnostic(code(quill::server::io))]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}")]
    #[diagnostic(code(quill::server::bind))]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server terminated unexpectedly")]
    #[diagnostic(code(quill::server::serve))]
    Serve {
        #[source]
        source: std::io::Error,
    },
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            ServerError::Multipart(e) => e.status(),
            ServerError::Io(_) | ServerError::Bind { .. } | ServerError::Serve { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }
        (status, Json(SaveResponse::err(self.to_string()))).into_response()
    }
}
