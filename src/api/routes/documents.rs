use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::{error::ApiError, state::AppState};
use crate::domain::SearchHit;
use crate::infrastructure::extract::is_supported_upload;
use crate::infrastructure::uploads::{safe_filename, save_upload};

const FILES_FIELD: &str = "files";

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub message: String,
    pub chunks_added: usize,
}

#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct CreateDocumentResponse {
    pub source: String,
    pub chunks_added: usize,
}

#[derive(Debug, Deserialize)]
pub struct SearchDocumentsRequest {
    pub query: String,
    pub limit: Option<usize>,
}

/// Multipart upload of one or more documents under the `files` field. Files
/// with an unsupported type are skipped; a request carrying no file at all is
/// rejected.
pub async fn ingest_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>, ApiError> {
    let storage = &state.config.config.storage;
    let mut received = 0usize;
    let mut ingested = 0usize;
    let mut chunks_added = 0usize;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string).filter(|n| !n.is_empty())
        else {
            continue;
        };
        received += 1;

        let mime = field.content_type().map(str::to_string);
        if !is_supported_upload(&file_name, mime.as_deref()) {
            warn!(file = %file_name, mime = ?mime, "skipping unsupported upload");
            continue;
        }

        let name = safe_filename(&file_name);
        let dest = storage.docs_dir.join(&name);
        let bytes = field.bytes().await?;
        save_upload(&bytes, &dest, storage.max_upload_bytes()).await?;

        ingested += 1;
        chunks_added += state
            .document_service
            .ingest_file(&dest, &name, mime.as_deref())
            .await?;
    }

    if received == 0 {
        return Err(ApiError::bad_request("No files provided"));
    }

    info!(received, ingested, chunks_added, "upload ingested");
    Ok(Json(IngestResponse {
        message: "Ingestion complete".to_string(),
        chunks_added,
    }))
}

pub async fn create_document(
    State(state): State<AppState>,
    Json(request): Json<CreateDocumentRequest>,
) -> Result<Json<CreateDocumentResponse>, ApiError> {
    let source = request.name.trim();
    if source.is_empty() {
        return Err(ApiError::bad_request("Document name is required"));
    }

    let chunks_added = state
        .document_service
        .ingest_text(source, &request.content)
        .await?;

    Ok(Json(CreateDocumentResponse {
        source: source.to_string(),
        chunks_added,
    }))
}

pub async fn search_documents(
    State(state): State<AppState>,
    Json(request): Json<SearchDocumentsRequest>,
) -> Result<Json<Vec<SearchHit>>, ApiError> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(ApiError::bad_request("Empty query"));
    }

    let top_k = request
        .limit
        .unwrap_or_else(|| state.rag_service.default_top_k());
    let hits = state.rag_service.retrieve_top_k(query, top_k).await?;
    Ok(Json(hits))
}
