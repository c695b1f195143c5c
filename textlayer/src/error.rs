use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Error taxonomy for the OCR job lifecycle.
///
/// Validation errors carry client-actionable detail (actual vs. limit).
/// Tool and internal errors surface only a generic category; diagnostic
/// detail stays in the server logs.
#[derive(Error, Debug)]
pub enum OcrJobError {
    #[error("Invalid file type. Please upload a PDF file.")]
    InvalidFileType,

    #[error("File too large: {actual_mb} MB (limit {limit_mb} MB)")]
    FileTooLarge { actual_mb: u64, limit_mb: u64 },

    #[error("Too many pages: {actual} (limit {limit})")]
    TooManyPages { actual: usize, limit: usize },

    #[error("The uploaded document could not be parsed as a PDF.")]
    CorruptDocument,

    #[error("The uploaded PDF is encrypted. Remove the password protection and retry.")]
    EncryptedInput,

    #[error("OCR toolchain unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Bad parameters: {0}")]
    BadParameters(String),

    #[error("OCR processing timed out after {seconds} seconds. Try a smaller file or disable heavy options.")]
    TimeoutExceeded { seconds: u64 },

    #[error("OCR processing failed. Please check server logs for details.")]
    ToolExecutionFailed,

    #[error("OCR reported success but no output file was produced.")]
    OutputMissing,

    #[error("Malformed multipart form: {0}")]
    MalformedForm(String),

    #[error("An unexpected server error occurred. Please check server logs.")]
    InternalUnexpected(String),
}

impl From<std::io::Error> for OcrJobError {
    fn from(e: std::io::Error) -> Self {
        OcrJobError::InternalUnexpected(format!("I/O error: {e}"))
    }
}

impl OcrJobError {
    /// Stable machine-readable name for the error kind, included in the
    /// JSON error body alongside the human-readable message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidFileType => "invalid_file_type",
            Self::FileTooLarge { .. } => "file_too_large",
            Self::TooManyPages { .. } => "too_many_pages",
            Self::CorruptDocument => "corrupt_document",
            Self::EncryptedInput => "encrypted_input",
            Self::DependencyUnavailable(_) => "dependency_unavailable",
            Self::BadParameters(_) => "bad_parameters",
            Self::TimeoutExceeded { .. } => "timeout_exceeded",
            Self::ToolExecutionFailed => "tool_execution_failed",
            Self::OutputMissing => "output_missing",
            Self::MalformedForm(_) => "malformed_form",
            Self::InternalUnexpected(_) => "internal_unexpected",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidFileType
            | Self::FileTooLarge { .. }
            | Self::TooManyPages { .. }
            | Self::CorruptDocument
            | Self::EncryptedInput
            | Self::BadParameters(_) => StatusCode::BAD_REQUEST,
            Self::MalformedForm(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::DependencyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::TimeoutExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::ToolExecutionFailed | Self::OutputMissing | Self::InternalUnexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for OcrJobError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal detail is logged server-side only; the client gets the
        // generic message from the Display impl.
        if let OcrJobError::InternalUnexpected(detail) = &self {
            tracing::error!(detail = %detail, "Unexpected error while handling request");
        }

        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, OcrJobError>;
