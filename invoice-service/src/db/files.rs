//! Uploaded file records.

use rusqlite::{OptionalExtension, params};

use super::models::{FileRecord, format_timestamp};
use super::{Database, is_unique_violation};
use crate::error::{DatabaseError, ServiceError, ServiceResult};

const FILE_COLUMNS: &str = "id, file_url, file_name, pathname, content_type, size, file_hash, invoice_id, created_at, updated_at";

impl Database {
    /// Insert a new file record
    pub fn insert_file(&self, file: &FileRecord) -> ServiceResult<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO files (id, file_url, file_name, pathname, content_type, size, file_hash, invoice_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                file.id,
                file.file_url,
                file.file_name,
                file.pathname,
                file.content_type,
                file.size as i64,
                file.file_hash,
                file.invoice_id,
                format_timestamp(&file.created_at),
                format_timestamp(&file.updated_at),
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::FileExists {
                    file_url: file.file_url.clone(),
                }
            } else {
                DatabaseError::Query(e).into()
            }
        })?;

        Ok(())
    }

    /// Look up a file by its public URL
    pub fn get_file_by_url(&self, file_url: &str) -> ServiceResult<Option<FileRecord>> {
        let conn = self.conn()?;

        conn.query_row(
            &format!("SELECT {} FROM files WHERE file_url = ?1", FILE_COLUMNS),
            params![file_url],
            FileRecord::from_row,
        )
        .optional()
        .map_err(|e| DatabaseError::Query(e).into())
    }

    /// List all files, newest first
    pub fn list_files(&self) -> ServiceResult<Vec<FileRecord>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM files ORDER BY created_at DESC, rowid DESC",
                FILE_COLUMNS
            ))
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map([], FileRecord::from_row)
            .map_err(DatabaseError::Query)?;

        let mut files = Vec::new();
        for row in rows {
            files.push(row.map_err(DatabaseError::Query)?);
        }

        Ok(files)
    }

    /// Record which invoice was extracted from the file at `file_url`.
    /// Returns false when no file has that URL.
    pub fn link_file_to_invoice(&self, file_url: &str, invoice_id: &str) -> ServiceResult<bool> {
        let conn = self.conn()?;

        let rows = conn
            .execute(
                "UPDATE files SET invoice_id = ?1, updated_at = ?2 WHERE file_url = ?3",
                params![invoice_id, format_timestamp(&super::now()), file_url],
            )
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }
}
