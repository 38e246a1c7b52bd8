//! Document upload route.
//!
//! DESIGN
//! ======
//! Accepts one multipart `file` field and returns its text so the client can
//! attach it to a chat turn under the document marker. Only `text/*` uploads
//! are decoded here; the other supported formats (PDF, Word) need extraction
//! this server does not perform and are rejected with an explanation.
//!
//! The route never touches the chat pipeline. It has its own limiter so
//! uploads and chat turns do not share a quota.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ErrorCode, GatewayError, respond};
use crate::rate_limit::{RateLimitError, client_identifier, now_ms};
use crate::state::AppState;

/// Largest accepted file, in bytes.
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Request body cap for the upload route. Leaves room for multipart framing
/// so an oversized file is reported as such instead of a truncated read.
pub const UPLOAD_BODY_LIMIT: usize = MAX_FILE_SIZE + 1024 * 1024;

pub const SUPPORTED_FILE_TYPES: [&str; 6] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "text/markdown",
    "text/csv",
];

const FILE_FIELD: &str = "file";

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    RateLimited(#[from] RateLimitError),
    #[error("malformed multipart body: {0}")]
    Multipart(String),
    #[error("Nenhum arquivo fornecido")]
    MissingFile,
    #[error("Arquivo muito grande. Tamanho máximo: 10MB")]
    TooLarge,
    #[error("Tipo de arquivo não suportado: {0}. Tipos suportados: PDF, Word, TXT, Markdown, CSV")]
    UnsupportedType(String),
    #[error("Processamento de PDF/Word requer bibliotecas adicionais")]
    ExtractionUnavailable,
}

impl ErrorCode for UploadError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::RateLimited(e) => e.error_code(),
            Self::Multipart(_) => "E_BAD_REQUEST",
            Self::MissingFile | Self::TooLarge | Self::UnsupportedType(_) => "E_VALIDATION",
            Self::ExtractionUnavailable => "E_EXTRACTION_UNAVAILABLE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

impl From<MultipartError> for UploadError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::TooLarge
        } else {
            Self::Multipart(err.body_text())
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let code = self.error_code();
        let (error, message) = match self {
            Self::RateLimited(e) => return respond(&GatewayError::RateLimited(e), false).into_response(),
            Self::Multipart(ref detail) => {
                warn!(error = %detail, "upload: malformed multipart body");
                ("Invalid request", "Invalid multipart form data".to_string())
            }
            Self::ExtractionUnavailable => (
                "Processamento de PDF/Word requer bibliotecas adicionais",
                "Por favor, use arquivos de texto (TXT, Markdown, CSV) ou implemente processamento de \
PDF/Word no servidor."
                    .to_string(),
            ),
            Self::MissingFile | Self::TooLarge | Self::UnsupportedType(_) => ("Validation error", self.to_string()),
        };
        let body = json!({ "error": error, "message": message, "code": code });
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedDocument {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: usize,
    pub content: String,
    /// Epoch milliseconds.
    pub uploaded_at: u64,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    success: bool,
    document: UploadedDocument,
}

/// A file pulled out of the multipart body, before validation.
struct ReceivedFile {
    name: String,
    mime_type: String,
    bytes: axum::body::Bytes,
}

// =============================================================================
// HANDLER
// =============================================================================

/// `POST /api/documents/upload`: accept a text document for attachment.
pub async fn upload(State(state): State<AppState>, headers: HeaderMap, multipart: Multipart) -> Response {
    match process_upload(&state, &headers, multipart).await {
        Ok(document) => {
            info!(id = %document.id, size = document.size, mime = %document.mime_type, "upload: accepted");
            Json(UploadResponse { success: true, document }).into_response()
        }
        Err(err) => {
            warn!(code = err.error_code(), error = %err, "upload: rejected");
            err.into_response()
        }
    }
}

async fn process_upload(
    state: &AppState,
    headers: &HeaderMap,
    multipart: Multipart,
) -> Result<UploadedDocument, UploadError> {
    let client_id = client_identifier(headers);
    state.upload_limiter.check_limit(&client_id)?;

    let file = read_file_field(multipart).await?.ok_or(UploadError::MissingFile)?;
    check_file(&file.mime_type, file.bytes.len())?;
    if !file.mime_type.starts_with("text/") {
        return Err(UploadError::ExtractionUnavailable);
    }

    Ok(UploadedDocument {
        id: format!("doc-{}", Uuid::new_v4()),
        name: file.name,
        mime_type: file.mime_type,
        size: file.bytes.len(),
        content: String::from_utf8_lossy(&file.bytes).into_owned(),
        uploaded_at: now_ms(),
    })
}

/// Find the `file` field and read it fully. Other fields are skipped.
async fn read_file_field(mut multipart: Multipart) -> Result<Option<ReceivedFile>, UploadError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let mime_type = field.content_type().map(essence).unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        return Ok(Some(ReceivedFile { name, mime_type, bytes }));
    }
    Ok(None)
}

/// Size first, then type.
pub(crate) fn check_file(mime_type: &str, size: usize) -> Result<(), UploadError> {
    if size > MAX_FILE_SIZE {
        return Err(UploadError::TooLarge);
    }
    if !SUPPORTED_FILE_TYPES.contains(&mime_type) {
        return Err(UploadError::UnsupportedType(mime_type.to_string()));
    }
    Ok(())
}

/// `text/plain; charset=utf-8` -> `text/plain`.
fn essence(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or_default().trim()
}

#[cfg(test)]
#[path = "documents_test.rs"]
mod tests;
