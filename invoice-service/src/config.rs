//! Service configuration.
//!
//! Loaded once at startup from an optional `config` file and `INVOICE__*`
//! environment variables (see [`loader`]).

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

mod loader;

pub use loader::load_config;

/// Complete service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_storage")]
    pub storage: StorageConfig,

    #[serde(default = "default_limits")]
    pub limits: LimitsConfig,

    #[serde(default = "default_gemini")]
    pub gemini: GeminiConfig,

    #[serde(default = "default_groq")]
    pub groq: GroqConfig,

    #[serde(default = "default_download")]
    pub download: DownloadConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Base URL clients use to reach this service. Blob URLs are built from it.
    #[serde(default)]
    pub public_url: Option<String>,

    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_server_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// Public base URL without a trailing slash
    pub fn public_url(&self) -> String {
        match &self.public_url {
            Some(url) if !url.trim().is_empty() => url.trim_end_matches('/').to_string(),
            _ => format!("http://localhost:{}", self.port),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("invoices.db")
    }

    pub fn blob_dir(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }
}

/// Size limits
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_bytes: u64,
}

/// Google Gemini configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_gemini_url")]
    pub base_url: String,

    #[serde(default = "default_gemini_model")]
    pub model: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Groq (OpenAI-compatible) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GroqConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_groq_url")]
    pub base_url: String,

    #[serde(default = "default_groq_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Settings for fetching remote PDFs by URL
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_download_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            storage: default_storage(),
            limits: default_limits(),
            gemini: default_gemini(),
            groq: default_groq(),
            download: default_download(),
        }
    }
}

// ==================== Default Value Functions ====================

fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
        public_url: None,
        cors_origins: default_cors_origins(),
        request_timeout_secs: default_server_timeout_secs(),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

fn default_server_timeout_secs() -> u64 {
    180
}

fn default_storage() -> StorageConfig {
    StorageConfig {
        data_dir: default_data_dir(),
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_limits() -> LimitsConfig {
    LimitsConfig {
        max_upload_size_bytes: default_max_upload_size(),
    }
}

fn default_max_upload_size() -> u64 {
    20 * 1024 * 1024
}

fn default_gemini() -> GeminiConfig {
    GeminiConfig {
        api_key: String::new(),
        base_url: default_gemini_url(),
        model: default_gemini_model(),
        request_timeout_secs: default_request_timeout_secs(),
    }
}

fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_groq() -> GroqConfig {
    GroqConfig {
        api_key: String::new(),
        base_url: default_groq_url(),
        model: default_groq_model(),
        temperature: default_temperature(),
        request_timeout_secs: default_request_timeout_secs(),
    }
}

fn default_groq_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_groq_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_download() -> DownloadConfig {
    DownloadConfig {
        request_timeout_secs: default_download_timeout_secs(),
    }
}

fn default_download_timeout_secs() -> u64 {
    60
}
