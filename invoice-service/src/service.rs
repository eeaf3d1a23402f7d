mod extraction;
mod files;
mod invoices;

pub use extraction::ExtractRequest;

use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::blob::BlobStore;
use crate::config::AppConfig;
use crate::db::Database;
use crate::error::{ServiceError, ServiceResult};
use crate::i18n::I18n;
use crate::llm::{GeminiClient, GroqClient};

/// Main service coordinator
pub struct InvoiceService {
    pub config: AppConfig,
    pub db: Arc<Database>,
    pub blobs: BlobStore,
    pub gemini: GeminiClient,
    pub groq: GroqClient,
    pub i18n: Arc<I18n>,
    /// Client for fetching PDFs hosted elsewhere
    downloader: Client,
}

impl InvoiceService {
    /// Create a new service instance around an opened database
    pub fn new(config: AppConfig, db: Arc<Database>) -> ServiceResult<Self> {
        info!("Initializing invoice service");

        let blobs = BlobStore::new(config.storage.blob_dir(), &config.server.public_url())?;

        let gemini = GeminiClient::new(config.gemini.clone())?;
        if gemini.is_configured() {
            info!(model = %config.gemini.model, "Gemini extraction enabled");
        } else {
            warn!("Gemini API key not set; gemini extraction is disabled");
        }

        let groq = GroqClient::new(config.groq.clone())?;
        if groq.is_configured() {
            info!(model = %config.groq.model, "Groq extraction enabled");
        } else {
            warn!("Groq API key not set; groq extraction is disabled");
        }

        let downloader = Client::builder()
            .timeout(Duration::from_secs(config.download.request_timeout_secs))
            .build()
            .map_err(|e| ServiceError::Internal {
                message: format!("Failed to build download client: {}", e),
            })?;

        Ok(Self {
            config,
            db,
            blobs,
            gemini,
            groq,
            i18n: Arc::new(I18n::new()),
            downloader,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    /// Service over a throwaway data directory. Provider URLs point at
    /// `provider_url` so tests can mock them.
    pub(crate) fn test_service(dir: &TempDir, provider_url: &str) -> InvoiceService {
        let mut config = AppConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();
        config.server.public_url = Some("http://invoices.test".to_string());
        config.gemini.api_key = "gemini-key".to_string();
        config.gemini.base_url = provider_url.to_string();
        config.gemini.request_timeout_secs = 5;
        config.groq.api_key = "groq-key".to_string();
        config.groq.base_url = provider_url.to_string();
        config.groq.request_timeout_secs = 5;
        config.download.request_timeout_secs = 5;

        let db = Arc::new(Database::open(&config.storage.database_path()).unwrap());
        InvoiceService::new(config, db).unwrap()
    }
}
