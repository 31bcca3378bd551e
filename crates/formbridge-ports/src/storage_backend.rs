//! Storage backend port per §4.J — the pluggable collaborator behind
//! upload negotiation. Implementers write local, S3, etc.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use formbridge_domain::UploadId;

#[derive(Debug, Clone)]
pub struct UploadConstraints {
    pub max_size: Option<u64>,
    pub allowed_types: Vec<String>,
    pub max_count: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct UploadUrlRequest {
    pub intake_id: String,
    pub submission_id: String,
    pub field_path: String,
    pub filename: String,
    pub mime_type: String,
    pub constraints: UploadConstraints,
}

#[derive(Debug, Clone)]
pub struct UploadUrlResponse {
    pub upload_id: UploadId,
    pub method: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct UploadedFileInfo {
    pub size_bytes: u64,
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub struct VerifyUploadResult {
    pub status: VerifyStatus,
    pub file: Option<UploadedFileInfo>,
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageBackendError {
    #[error("upload {0} not found")]
    NotFound(String),
    #[error("storage backend error: {message}")]
    Backend { message: String },
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn generate_upload_url(&self, request: UploadUrlRequest) -> Result<UploadUrlResponse, StorageBackendError>;

    async fn verify_upload(&self, upload_id: &UploadId) -> Result<VerifyUploadResult, StorageBackendError>;

    async fn generate_download_url(&self, upload_id: &UploadId) -> Result<Option<String>, StorageBackendError>;
}
