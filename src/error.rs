use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Request data is missing or malformed.
    #[error("Invalid input ({field}): {message}")]
    InvalidInput {
        /// Offending field.
        field: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// Cover image could not be fetched or decoded.
    #[error("Image processing error ({field}): {message}")]
    ImageProcessing {
        /// Offending field.
        field: &'static str,
        /// Underlying failure.
        message: String,
    },

    /// Markdown could not be converted into flow-document paragraphs.
    #[error("Content processing error ({field}): {message}")]
    ContentProcessing {
        /// Offending field.
        field: &'static str,
        /// Underlying failure.
        message: String,
    },

    /// Markdown could not be drawn onto the PDF page surface.
    #[error("PDF rendering error ({field}): {message}")]
    PdfRendering {
        /// Offending field.
        field: &'static str,
        /// Underlying failure.
        message: String,
    },

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP archive error.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Outbound HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for [`AppError::InvalidInput`].
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        AppError::InvalidInput {
            field,
            message: message.into(),
        }
    }

    /// Shorthand for [`AppError::ImageProcessing`] on the cover field.
    pub fn cover(message: impl Into<String>) -> Self {
        AppError::ImageProcessing {
            field: "coverImageUrl",
            message: message.into(),
        }
    }

    /// Shorthand for [`AppError::ContentProcessing`].
    pub fn content(field: &'static str, message: impl Into<String>) -> Self {
        AppError::ContentProcessing {
            field,
            message: message.into(),
        }
    }

    /// Shorthand for [`AppError::PdfRendering`].
    pub fn pdf(field: &'static str, message: impl Into<String>) -> Self {
        AppError::PdfRendering {
            field,
            message: message.into(),
        }
    }

    /// Field the error refers to, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            AppError::InvalidInput { field, .. }
            | AppError::ImageProcessing { field, .. }
            | AppError::ContentProcessing { field, .. }
            | AppError::PdfRendering { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::error!(error = %self, field = self.field(), "Request error");

        (status, self.to_string()).into_response()
    }
}

/// Result type alias for the application.
pub type Result<T> = std::result::Result<T, AppError>;
