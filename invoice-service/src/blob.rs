//! Local blob storage for uploaded PDFs.
//!
//! Blobs live as flat files under the storage directory and are served back
//! at `<public_url>/api/v1/files/blob/<pathname>`. Pathnames get a random
//! suffix so re-uploading the same file name never collides.

use bytes::Bytes;
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tracing::debug;
use url::Url;

use crate::error::{ServiceError, ServiceResult, StorageError};

/// Route prefix (relative to the public URL) that serves blobs
pub const BLOB_ROUTE_PREFIX: &str = "/api/v1/files/blob/";

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

const SUFFIX_LEN: usize = 16;

/// PDF readers accept the header anywhere in the first 1024 bytes
const PDF_HEADER_WINDOW: usize = 1024;

/// Result of storing a blob
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub pathname: String,
    pub url: String,
    pub content_type: String,
    pub size: u64,
    pub file_hash: String,
}

/// Filesystem-backed blob store
pub struct BlobStore {
    root: PathBuf,
    public_url: String,
    public_base: Url,
}

impl BlobStore {
    /// Create the store, making sure its directory exists
    pub fn new(root: PathBuf, public_url: &str) -> ServiceResult<Self> {
        let public_base = Url::parse(public_url).map_err(|e| ServiceError::Config {
            message: format!("Invalid public URL '{}': {}", public_url, e),
        })?;
        std::fs::create_dir_all(&root).map_err(StorageError::Io)?;
        Ok(Self {
            root,
            public_url: public_url.trim_end_matches('/').to_string(),
            public_base,
        })
    }

    /// Store a PDF under a fresh pathname derived from `file_name`.
    /// Either the declared content type or the PDF header must say PDF.
    pub async fn put(
        &self,
        file_name: &str,
        content_type: Option<&str>,
        content: &[u8],
    ) -> ServiceResult<StoredBlob> {
        let declared_pdf = content_type.is_some_and(is_pdf_content_type);
        if !declared_pdf && !looks_like_pdf(content) {
            return Err(StorageError::UnsupportedFormat {
                content_type: content_type
                    .unwrap_or_else(|| sniff_content_type(content))
                    .to_string(),
            }
            .into());
        }

        let pathname = format!("{}-{}.pdf", sanitize_stem(file_name), random_suffix());
        let path = self.root.join(&pathname);
        tokio::fs::write(&path, content)
            .await
            .map_err(StorageError::Io)?;

        debug!(pathname = %pathname, size = content.len(), "Stored blob");

        Ok(StoredBlob {
            url: self.url_for(&pathname),
            pathname,
            content_type: PDF_CONTENT_TYPE.to_string(),
            size: content.len() as u64,
            file_hash: content_hash(content),
        })
    }

    /// Read a stored blob
    pub async fn get(&self, pathname: &str) -> ServiceResult<Bytes> {
        validate_pathname(pathname)?;

        match tokio::fs::read(self.root.join(pathname)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::BlobNotFound {
                    pathname: pathname.to_string(),
                }
                .into())
            }
            Err(e) => Err(StorageError::Io(e).into()),
        }
    }

    /// Public URL of a pathname
    pub fn url_for(&self, pathname: &str) -> String {
        format!(
            "{}{}{}",
            self.public_url,
            BLOB_ROUTE_PREFIX,
            urlencoding::encode(pathname)
        )
    }

    /// Pathname for a URL served by this store, if it is one
    pub fn pathname_for_url(&self, url: &str) -> Option<String> {
        let url = Url::parse(url).ok()?;
        if url.scheme() != self.public_base.scheme()
            || url.host() != self.public_base.host()
            || url.port_or_known_default() != self.public_base.port_or_known_default()
        {
            return None;
        }

        let base_path = self.public_base.path().trim_end_matches('/');
        let encoded = url
            .path()
            .strip_prefix(base_path)?
            .strip_prefix(BLOB_ROUTE_PREFIX)?;
        let pathname = urlencoding::decode(encoded).ok()?.into_owned();
        validate_pathname(&pathname).ok()?;
        Some(pathname)
    }
}

/// SHA-256 of `content` as lowercase hex
pub fn content_hash(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

fn is_pdf_content_type(content_type: &str) -> bool {
    content_type
        .parse::<mime::Mime>()
        .is_ok_and(|m| m.essence_str() == mime::APPLICATION_PDF.essence_str())
}

fn looks_like_pdf(content: &[u8]) -> bool {
    let window = &content[..content.len().min(PDF_HEADER_WINDOW)];
    window.windows(5).any(|w| w == b"%PDF-")
}

/// Best-effort label for rejected content, used in error messages
fn sniff_content_type(content: &[u8]) -> &'static str {
    if content.starts_with(b"\x89PNG") {
        "image/png"
    } else if content.starts_with(b"\xFF\xD8\xFF") {
        "image/jpeg"
    } else if content.starts_with(b"PK\x03\x04") {
        "application/zip"
    } else if std::str::from_utf8(content).is_ok() {
        "text/plain"
    } else {
        "application/octet-stream"
    }
}

/// File stem reduced to `[A-Za-z0-9_-]`, never empty
fn sanitize_stem(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);
    let stem = match base.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => base,
    };

    let sanitized: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let sanitized = sanitized.trim_matches('-');

    if sanitized.is_empty() {
        "file".to_string()
    } else {
        sanitized.to_string()
    }
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect()
}

fn validate_pathname(pathname: &str) -> Result<(), StorageError> {
    if pathname.is_empty()
        || pathname.starts_with('.')
        || pathname.contains(['/', '\\'])
        || pathname.contains("..")
    {
        return Err(StorageError::InvalidPathname {
            pathname: pathname.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\ntrailer\n<<>>\n%%EOF\n";

    fn store(dir: &TempDir) -> BlobStore {
        BlobStore::new(dir.path().join("blobs"), "http://localhost:4000/").unwrap()
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let blob = store.put("March Invoice.pdf", Some("application/pdf"), PDF).await.unwrap();
        assert!(blob.pathname.starts_with("March-Invoice-"));
        assert!(blob.pathname.ends_with(".pdf"));
        assert_eq!(blob.size, PDF.len() as u64);
        assert_eq!(
            blob.url,
            format!("http://localhost:4000/api/v1/files/blob/{}", blob.pathname)
        );

        let data = store.get(&blob.pathname).await.unwrap();
        assert_eq!(&data[..], PDF);
    }

    #[tokio::test]
    async fn test_same_name_gets_distinct_pathnames() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let a = store.put("invoice.pdf", None, PDF).await.unwrap();
        let b = store.put("invoice.pdf", None, PDF).await.unwrap();
        assert_ne!(a.pathname, b.pathname);
        assert_eq!(a.file_hash, b.file_hash);
    }

    #[tokio::test]
    async fn test_rejects_non_pdf() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let err = store.put("notes.txt", None, b"just some text").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Storage(StorageError::UnsupportedFormat { ref content_type })
                if content_type == "text/plain"
        ));

        let err = store
            .put("scan.png", Some("image/png"), b"\x89PNG\r\n")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "unsupported_format");
    }

    #[tokio::test]
    async fn test_accepts_declared_pdf_or_pdf_header() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        // octet-stream upload whose bytes are a PDF
        let blob = store
            .put("invoice.pdf", Some("application/octet-stream"), PDF)
            .await
            .unwrap();
        assert_eq!(blob.content_type, "application/pdf");

        assert!(is_pdf_content_type("Application/PDF; charset=binary"));
        assert!(!is_pdf_content_type("application/pdfx"));
    }

    #[tokio::test]
    async fn test_get_missing_and_traversal() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let err = store.get("missing.pdf").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Storage(StorageError::BlobNotFound { .. })
        ));

        let err = store.get("../invoices.db").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Storage(StorageError::InvalidPathname { .. })
        ));
    }

    #[test]
    fn test_pathname_for_url() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let url = store.url_for("invoice-abc.pdf");
        assert_eq!(
            store.pathname_for_url(&url).as_deref(),
            Some("invoice-abc.pdf")
        );
        assert_eq!(
            store.pathname_for_url("https://cdn.example.com/invoice-abc.pdf"),
            None
        );
        assert_eq!(
            store.pathname_for_url("http://localhost:4000/api/v1/files/blob/..%2Fsecret"),
            None
        );
        assert_eq!(
            store.pathname_for_url("http://localhost:4001/api/v1/files/blob/invoice-abc.pdf"),
            None
        );
    }

    #[test]
    fn test_pathname_for_url_normalizes_own_urls() {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::new(dir.path().join("blobs"), "http://invoices.test").unwrap();

        for url in [
            "http://invoices.test/api/v1/files/blob/a-x.pdf?download=1",
            "http://invoices.test/api/v1/files/blob/a-x.pdf#page=2",
            "http://INVOICES.test/api/v1/files/blob/a-x.pdf",
            "http://invoices.test:80/api/v1/files/blob/a-x.pdf",
        ] {
            assert_eq!(store.pathname_for_url(url).as_deref(), Some("a-x.pdf"), "{url}");
        }

        assert_eq!(
            store.pathname_for_url("https://invoices.test/api/v1/files/blob/a-x.pdf"),
            None
        );
    }

    #[test]
    fn test_pathname_for_url_with_base_path() {
        let dir = TempDir::new().unwrap();
        let store =
            BlobStore::new(dir.path().join("blobs"), "https://example.com/invoicing/").unwrap();

        let url = store.url_for("March-Invoice-abc.pdf");
        assert_eq!(
            url,
            "https://example.com/invoicing/api/v1/files/blob/March-Invoice-abc.pdf"
        );
        assert_eq!(
            store.pathname_for_url(&url).as_deref(),
            Some("March-Invoice-abc.pdf")
        );
        assert_eq!(
            store.pathname_for_url("https://example.com/api/v1/files/blob/March-Invoice-abc.pdf"),
            None
        );
    }

    #[test]
    fn test_rejects_invalid_public_url() {
        let dir = TempDir::new().unwrap();
        let err = BlobStore::new(dir.path().join("blobs"), "not a url").err().unwrap();
        assert!(matches!(err, ServiceError::Config { .. }));
    }

    #[test]
    fn test_sanitize_stem() {
        assert_eq!(sanitize_stem("invoice.pdf"), "invoice");
        assert_eq!(sanitize_stem("C:\\scans\\Q1 report.PDF"), "Q1-report");
        assert_eq!(sanitize_stem("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_stem("???.pdf"), "file");
        assert_eq!(sanitize_stem(".pdf"), "pdf");
    }

    #[test]
    fn test_content_hash() {
        assert_eq!(
            content_hash(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
