//! Filesystem-backed `StorageBackend` per §4.J.
//!
//! Not content-addressed like the S3 backend — the local backend exists
//! for single-process dev/test setups where there is no object store to
//! presign against, so "signed URLs" are capability tokens over a local
//! HTTP file route rather than S3 presigned requests.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use formbridge_ports::{
    StorageBackend, StorageBackendError, UploadUrlRequest, UploadUrlResponse, UploadedFileInfo,
    VerifyStatus, VerifyUploadResult,
};

#[derive(Debug, Clone)]
struct PendingUpload {
    path: PathBuf,
    constraints_max_size: Option<u64>,
    mime_type: String,
}

/// Stores confirmed uploads under `root/{uploadId}`, addressed by a capability
/// token embedded in the returned URL rather than real presigning.
pub struct LocalStorageBackend {
    root: PathBuf,
    base_url: String,
    ttl: chrono::Duration,
    pending: RwLock<HashMap<String, PendingUpload>>,
}

impl LocalStorageBackend {
    pub fn new(root: PathBuf, base_url: String) -> Self {
        Self {
            root,
            base_url,
            ttl: chrono::Duration::minutes(15),
            pending: RwLock::new(HashMap::new()),
        }
    }

    fn token(upload_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(upload_id.as_bytes());
        hex::encode(hasher.finalize())[..32].to_string()
    }
}

#[async_trait]
impl StorageBackend for LocalStorageBackend {
    async fn generate_upload_url(
        &self,
        request: UploadUrlRequest,
    ) -> Result<UploadUrlResponse, StorageBackendError> {
        let upload_id = formbridge_domain::UploadId::new();
        let token = Self::token(upload_id.as_str());
        let path = self
            .root
            .join(&request.intake_id)
            .join(request.submission_id.as_str())
            .join(upload_id.as_str());

        let expires_at = Utc::now() + self.ttl;
        self.pending.write().await.insert(
            upload_id.as_str().to_string(),
            PendingUpload {
                path: path.clone(),
                constraints_max_size: request.constraints.max_size,
                mime_type: request.mime_type.clone(),
            },
        );

        Ok(UploadUrlResponse {
            upload_id,
            method: "PUT".to_string(),
            url: format!("{}/uploads/{}?token={}", self.base_url, path.display(), token),
            expires_at,
        })
    }

    async fn verify_upload(
        &self,
        upload_id: &formbridge_domain::UploadId,
    ) -> Result<VerifyUploadResult, StorageBackendError> {
        let pending = self.pending.read().await;
        let Some(entry) = pending.get(upload_id.as_str()) else {
            return Err(StorageBackendError::NotFound(upload_id.as_str().to_string()));
        };

        let metadata = match tokio::fs::metadata(&entry.path).await {
            Ok(m) => m,
            Err(_) => {
                return Ok(VerifyUploadResult {
                    status: VerifyStatus::Pending,
                    file: None,
                    error: None,
                });
            }
        };

        if let Some(max_size) = entry.constraints_max_size {
            if metadata.len() > max_size {
                return Ok(VerifyUploadResult {
                    status: VerifyStatus::Failed,
                    file: None,
                    error: Some(format!("file exceeds maximum size of {max_size} bytes")),
                });
            }
        }

        Ok(VerifyUploadResult {
            status: VerifyStatus::Completed,
            file: Some(UploadedFileInfo {
                size_bytes: metadata.len(),
                mime_type: entry.mime_type.clone(),
            }),
            error: None,
        })
    }

    async fn generate_download_url(
        &self,
        upload_id: &formbridge_domain::UploadId,
    ) -> Result<Option<String>, StorageBackendError> {
        let pending = self.pending.read().await;
        let Some(entry) = pending.get(upload_id.as_str()) else {
            return Ok(None);
        };
        let token = Self::token(upload_id.as_str());
        Ok(Some(format!(
            "{}/uploads/{}?token={}",
            self.base_url,
            entry.path.display(),
            token
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formbridge_ports::{UploadConstraints, UploadUrlRequest};
    use tempfile::tempdir;

    fn request(submission_id: formbridge_domain::SubmissionId) -> UploadUrlRequest {
        UploadUrlRequest {
            intake_id: "vendor_onboarding".to_string(),
            submission_id,
            field_path: "attachments.w9".to_string(),
            filename: "w9.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            constraints: UploadConstraints {
                max_size: Some(10),
                allowed_types: vec!["application/pdf".to_string()],
                max_count: Some(1),
            },
        }
    }

    #[tokio::test]
    async fn verify_upload_is_pending_until_the_file_exists() {
        let dir = tempdir().unwrap();
        let backend = LocalStorageBackend::new(dir.path().to_path_buf(), "http://localhost".to_string());
        let response = backend
            .generate_upload_url(request(formbridge_domain::SubmissionId::new()))
            .await
            .unwrap();

        let result = backend.verify_upload(&response.upload_id).await.unwrap();
        assert_eq!(result.status, VerifyStatus::Pending);
    }

    #[tokio::test]
    async fn verify_upload_fails_when_the_file_exceeds_max_size() {
        let dir = tempdir().unwrap();
        let backend = LocalStorageBackend::new(dir.path().to_path_buf(), "http://localhost".to_string());
        let response = backend
            .generate_upload_url(request(formbridge_domain::SubmissionId::new()))
            .await
            .unwrap();

        let path = dir
            .path()
            .join("vendor_onboarding")
            .join(response.upload_id.as_str());
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, b"this file is far larger than ten bytes").await.unwrap();

        let result = backend.verify_upload(&response.upload_id).await.unwrap();
        assert_eq!(result.status, VerifyStatus::Failed);
    }
}
