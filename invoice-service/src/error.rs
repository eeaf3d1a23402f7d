use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::i18n::I18n;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invoice not found: {invoice_id}")]
    InvoiceNotFound { invoice_id: String },

    #[error("Invoice already exists for file: {file_url}")]
    InvoiceExists { file_url: String },

    #[error("File already exists: {file_url}")]
    FileExists { file_url: String },

    #[error("Unsupported model: {model}")]
    UnsupportedModel { model: String },

    #[error("fileUrl and model are required")]
    MissingExtractParams,

    #[error("No file provided")]
    NoFileProvided,

    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Failed to extract data")]
    Extraction(#[from] ExtractionError),

    #[error("Database error")]
    Database(#[from] DatabaseError),

    #[error("Storage error")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Errors from fetching a PDF and turning a model reply into invoice data
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("{provider} is not configured (missing API key)")]
    NotConfigured { provider: &'static str },

    #[error("Connection failed to {provider}")]
    Connection {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} request failed (status {status}): {message}")]
    Provider {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("{provider} returned no content")]
    EmptyResponse { provider: &'static str },

    #[error("Invalid response from {provider}")]
    InvalidResponse {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Model output is not valid invoice JSON")]
    MalformedResponse {
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to download {url}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to download {url} (status {status})")]
    DownloadStatus { url: String, status: u16 },

    #[error("Failed to read PDF")]
    PdfRead(#[source] lopdf::Error),

    #[error("PDF contains no extractable text")]
    NoText,
}

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed")]
    Connection(#[source] rusqlite::Error),

    #[error("Query failed")]
    Query(#[source] rusqlite::Error),

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Database lock poisoned")]
    Poisoned,
}

/// Blob storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Blob not found: {pathname}")]
    BlobNotFound { pathname: String },

    #[error("Invalid blob pathname: {pathname}")]
    InvalidPathname { pathname: String },

    #[error("Unsupported file format: {content_type} (only application/pdf is accepted)")]
    UnsupportedFormat { content_type: String },

    #[error("File too large (max {max} bytes)")]
    FileTooLarge { max: u64 },

    #[error("IO error")]
    Io(#[from] std::io::Error),
}

/// API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvoiceNotFound { .. }
            | ServiceError::Storage(StorageError::BlobNotFound { .. }) => StatusCode::NOT_FOUND,
            ServiceError::InvoiceExists { .. } | ServiceError::FileExists { .. } => {
                StatusCode::CONFLICT
            }
            ServiceError::UnsupportedModel { .. }
            | ServiceError::MissingExtractParams
            | ServiceError::NoFileProvided
            | ServiceError::Validation { .. }
            | ServiceError::InvalidRequest { .. }
            | ServiceError::Storage(StorageError::InvalidPathname { .. }) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::Storage(StorageError::UnsupportedFormat { .. }) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            ServiceError::Storage(StorageError::FileTooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ServiceError::Extraction(ExtractionError::NotConfigured { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ServiceError::Extraction(ExtractionError::PdfRead(_) | ExtractionError::NoText) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServiceError::Extraction(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::InvoiceNotFound { .. } => "invoice_not_found",
            ServiceError::InvoiceExists { .. } => "invoice_exists",
            ServiceError::FileExists { .. } => "file_exists",
            ServiceError::UnsupportedModel { .. } => "unsupported_model",
            ServiceError::MissingExtractParams => "missing_parameters",
            ServiceError::NoFileProvided => "no_file",
            ServiceError::Validation { .. } => "validation_error",
            ServiceError::InvalidRequest { .. } => "invalid_request",
            ServiceError::Extraction(ExtractionError::NotConfigured { .. }) => {
                "provider_not_configured"
            }
            ServiceError::Extraction(ExtractionError::Connection { .. }) => "provider_connection",
            ServiceError::Extraction(ExtractionError::Provider { .. }) => "provider_error",
            ServiceError::Extraction(ExtractionError::EmptyResponse { .. }) => "provider_empty",
            ServiceError::Extraction(ExtractionError::InvalidResponse { .. }) => {
                "provider_invalid_response"
            }
            ServiceError::Extraction(ExtractionError::MalformedResponse { .. }) => {
                "malformed_model_output"
            }
            ServiceError::Extraction(
                ExtractionError::Download { .. } | ExtractionError::DownloadStatus { .. },
            ) => "download_failed",
            ServiceError::Extraction(ExtractionError::PdfRead(_)) => "pdf_read_error",
            ServiceError::Extraction(ExtractionError::NoText) => "pdf_no_text",
            ServiceError::Database(_) => "database_error",
            ServiceError::Storage(StorageError::BlobNotFound { .. }) => "blob_not_found",
            ServiceError::Storage(StorageError::InvalidPathname { .. }) => "invalid_pathname",
            ServiceError::Storage(StorageError::UnsupportedFormat { .. }) => "unsupported_format",
            ServiceError::Storage(StorageError::FileTooLarge { .. }) => "file_too_large",
            ServiceError::Storage(StorageError::Io(_)) => "io_error",
            ServiceError::Config { .. } => "config_error",
            ServiceError::Internal { .. } => "internal_error",
        }
    }

    /// Extra context for the response body. Extraction failures carry the
    /// full error chain so the caller sees the provider's own message.
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ServiceError::Extraction(ExtractionError::MalformedResponse { raw, .. }) => {
                Some(serde_json::json!({
                    "error": format_error_chain(self),
                    "raw": raw,
                }))
            }
            ServiceError::Extraction(_) => {
                Some(serde_json::json!({ "error": format_error_chain(self) }))
            }
            _ => None,
        }
    }

    /// Get a user-friendly translated message
    pub fn user_message(&self, i18n: &I18n, locale: &str) -> String {
        match self {
            ServiceError::InvoiceNotFound { .. } => i18n.get(locale, "error-invoice-not-found", None),
            ServiceError::InvoiceExists { .. } => i18n.get(locale, "error-invoice-exists", None),
            ServiceError::FileExists { .. } => i18n.get(locale, "error-file-exists", None),
            ServiceError::UnsupportedModel { model } => {
                i18n.format(locale, "error-unsupported-model", &[("model", model)])
            }
            ServiceError::MissingExtractParams => i18n.get(locale, "error-extract-params", None),
            ServiceError::NoFileProvided => i18n.get(locale, "error-no-file", None),
            ServiceError::Validation { message } | ServiceError::InvalidRequest { message } => {
                message.clone()
            }
            ServiceError::Extraction(_) => i18n.get(locale, "error-extraction-failed", None),
            ServiceError::Internal { .. } | ServiceError::Database(_) => {
                i18n.get(locale, "error-internal", None)
            }
            // For other errors, fall back to the technical message
            _ => self.to_string(),
        }
    }

    /// Convert to an error response with i18n support
    pub fn into_response_with_i18n(self, i18n: &I18n, locale: &str) -> Response {
        let response = ErrorResponse {
            success: false,
            message: self.user_message(i18n, locale),
            code: Some(self.error_code().to_string()),
            details: self.details(),
        };

        (self.status_code(), Json(response)).into_response()
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let response = ErrorResponse {
            success: false,
            message: self.to_string(),
            code: Some(self.error_code().to_string()),
            details: self.details(),
        };

        (self.status_code(), Json(response)).into_response()
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages = Vec::new();
        collect_validation_messages(&errors, &mut messages);
        messages.sort();
        messages.dedup();
        ServiceError::Validation {
            message: messages.join("; "),
        }
    }
}

fn collect_validation_messages(errors: &validator::ValidationErrors, out: &mut Vec<String>) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    out.push(match &error.message {
                        Some(message) => message.to_string(),
                        None => format!("{} is invalid ({})", field, error.code),
                    });
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_validation_messages(nested, out),
            ValidationErrorsKind::List(items) => {
                for nested in items.values() {
                    collect_validation_messages(nested, out);
                }
            }
        }
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Render an error and all of its sources as `outer: inner: innermost`.
pub fn format_error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Error wrapper with i18n support for API responses
pub struct I18nError {
    pub error: ServiceError,
    pub i18n: std::sync::Arc<I18n>,
    pub locale: String,
}

impl I18nError {
    pub fn new(error: ServiceError, i18n: std::sync::Arc<I18n>, locale: impl Into<String>) -> Self {
        Self {
            error,
            i18n,
            locale: locale.into(),
        }
    }
}

impl IntoResponse for I18nError {
    fn into_response(self) -> Response {
        self.error.into_response_with_i18n(&self.i18n, &self.locale)
    }
}
