use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::{info, warn};

mod api;
mod blob;
mod config;
mod db;
mod error;
mod i18n;
mod ingestion;
mod llm;
mod service;

use crate::db::Database;
use crate::service::InvoiceService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env is optional; real environment variables win
    let dotenv_error = dotenvy::dotenv().err().filter(|e| !e.not_found());

    init_logging();

    info!("Starting invoice service v{}", env!("CARGO_PKG_VERSION"));
    if let Some(e) = dotenv_error {
        warn!(error = %e, "Failed to load .env file");
    }

    let config = config::load_config()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        public_url = %config.server.public_url(),
        "Configuration loaded"
    );

    // Ensure data directory exists
    std::fs::create_dir_all(&config.storage.data_dir)?;

    // Initialize database
    let db_path = config.storage.database_path();
    let db = Arc::new(Database::open(&db_path)?);
    info!(path = %db_path.display(), "Database initialized");

    let metrics = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Prometheus recorder not installed; /metrics disabled");
            None
        }
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Initialize the service
    let service = Arc::new(InvoiceService::new(config, db)?);

    let app = api::router(service, metrics);

    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("invoice_service=info,tower_http=info"));

    // LOG_FORMAT=json for log shippers
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
        return;
    }

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
