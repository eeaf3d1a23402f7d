//! The extraction pipeline: fetch a PDF, ask a model for its data, store
//! the result as an invoice.

use bytes::Bytes;
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::db::{Invoice, NewInvoice};
use crate::error::{ExtractionError, ServiceError, ServiceResult, format_error_chain};
use crate::ingestion::pdf;
use crate::llm::{self, ExtractionModel};
use crate::service::InvoiceService;

/// Body of an extraction request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl InvoiceService {
    /// Extract invoice data from the PDF at `fileUrl` and store it
    pub async fn extract_invoice(&self, request: ExtractRequest) -> ServiceResult<Invoice> {
        let (Some(file_url), Some(model_name)) = (present(request.file_url), present(request.model))
        else {
            return Err(ServiceError::MissingExtractParams);
        };

        let model: ExtractionModel = model_name
            .parse()
            .map_err(|_| ServiceError::UnsupportedModel { model: model_name })?;

        let started = Instant::now();
        let result = self
            .run_extraction(model, &file_url, present(request.file_name))
            .await;
        let elapsed = started.elapsed();

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.error_code(),
        };
        metrics::counter!(
            "invoice_extractions_total",
            "model" => model.to_string(),
            "outcome" => outcome
        )
        .increment(1);
        metrics::histogram!(
            "invoice_extraction_duration_seconds",
            "model" => model.to_string()
        )
        .record(elapsed.as_secs_f64());

        match &result {
            Ok(invoice) => info!(
                invoice_id = %invoice.id,
                model = %model,
                file_url = %file_url,
                elapsed_ms = elapsed.as_millis() as u64,
                "Invoice extracted"
            ),
            Err(e) => warn!(
                model = %model,
                file_url = %file_url,
                error = %format_error_chain(e),
                "Extraction failed"
            ),
        }

        result
    }

    async fn run_extraction(
        &self,
        model: ExtractionModel,
        file_url: &str,
        file_name: Option<String>,
    ) -> ServiceResult<Invoice> {
        let content = self.fetch_pdf(file_url).await?;

        let raw = match model {
            ExtractionModel::Gemini => self.gemini.extract_from_pdf(&content).await?,
            ExtractionModel::Groq => {
                let text = tokio::task::spawn_blocking(move || pdf::extract_text(&content))
                    .await
                    .map_err(|e| ServiceError::Internal {
                        message: format!("PDF text extraction task failed: {}", e),
                    })??;
                self.groq.extract_from_text(&text).await?
            }
        };

        let extracted = llm::parse_extraction(&raw)?;

        let file_name = match file_name {
            Some(name) => name,
            None => self.resolve_file_name(file_url)?,
        };

        let invoice =
            self.create_invoice(NewInvoice::from_extraction(file_url, file_name, extracted))?;

        if !self.db.link_file_to_invoice(file_url, &invoice.id)? {
            debug!(file_url = %file_url, "No uploaded file record for extracted URL");
        }

        Ok(invoice)
    }

    /// Our own blob URLs are read from disk; anything else is downloaded
    async fn fetch_pdf(&self, file_url: &str) -> ServiceResult<Bytes> {
        if let Some(pathname) = self.blobs.pathname_for_url(file_url) {
            debug!(pathname = %pathname, "Reading PDF from blob store");
            return self.blobs.get(&pathname).await;
        }

        debug!(url = %file_url, "Downloading PDF");

        let response = self
            .downloader
            .get(file_url)
            .send()
            .await
            .map_err(|source| ExtractionError::Download {
                url: file_url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(ExtractionError::DownloadStatus {
                url: file_url.to_string(),
                status: response.status().as_u16(),
            }
            .into());
        }

        let content = response
            .bytes()
            .await
            .map_err(|source| ExtractionError::Download {
                url: file_url.to_string(),
                source,
            })?;

        Ok(content)
    }

    /// Name recorded at upload, else the last segment of the URL path
    fn resolve_file_name(&self, file_url: &str) -> ServiceResult<String> {
        if let Some(file) = self.db.get_file_by_url(file_url)? {
            return Ok(file.file_name);
        }

        Ok(url_file_name(file_url).unwrap_or_else(|| file_url.to_string()))
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn url_file_name(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let segment = url.path_segments()?.last()?;
    if segment.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(segment).ok()?;
    Some(decoded.into_owned())
}
