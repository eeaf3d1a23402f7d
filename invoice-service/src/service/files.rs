//! Uploaded file operations.

use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::db::{self, FileRecord};
use crate::error::{ServiceError, ServiceResult, StorageError};
use crate::service::InvoiceService;

impl InvoiceService {
    /// Store an uploaded PDF and record it
    pub async fn upload_file(
        &self,
        file_name: &str,
        content_type: Option<&str>,
        content: Bytes,
    ) -> ServiceResult<FileRecord> {
        if content.is_empty() {
            return Err(ServiceError::NoFileProvided);
        }

        let max = self.config.limits.max_upload_size_bytes;
        if content.len() as u64 > max {
            return Err(StorageError::FileTooLarge { max }.into());
        }

        let blob = self.blobs.put(file_name, content_type, &content).await?;

        let file_name = if file_name.trim().is_empty() {
            blob.pathname.clone()
        } else {
            file_name.to_string()
        };

        let now = db::now();
        let record = FileRecord {
            id: Uuid::new_v4().to_string(),
            file_url: blob.url,
            file_name,
            pathname: blob.pathname,
            content_type: blob.content_type,
            size: blob.size,
            file_hash: blob.file_hash,
            invoice_id: None,
            created_at: now,
            updated_at: now,
        };
        self.db.insert_file(&record)?;

        info!(
            file_id = %record.id,
            file_name = %record.file_name,
            size = record.size,
            "File uploaded"
        );

        Ok(record)
    }

    pub fn list_files(&self) -> ServiceResult<Vec<FileRecord>> {
        self.db.list_files()
    }

    /// Raw bytes of a stored blob
    pub async fn read_blob(&self, pathname: &str) -> ServiceResult<Bytes> {
        self.blobs.get(pathname).await
    }
}
