use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{prompts, provider_error_message};
use crate::blob::PDF_CONTENT_TYPE;
use crate::config::GeminiConfig;
use crate::error::{ExtractionError, ServiceResult};

const PROVIDER: &str = "Gemini";

/// Gemini `generateContent` client
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|source| ExtractionError::Connection {
                provider: PROVIDER,
                source,
            })?;

        Ok(Self { client, config })
    }

    pub fn is_configured(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    /// Send the PDF inline with the extraction prompt and return the reply text
    pub async fn extract_from_pdf(&self, pdf: &[u8]) -> Result<String, ExtractionError> {
        if !self.is_configured() {
            return Err(ExtractionError::NotConfigured { provider: PROVIDER });
        }

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    RequestPart::Text {
                        text: prompts::gemini_extraction_prompt(),
                    },
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: PDF_CONTENT_TYPE,
                            data: BASE64.encode(pdf),
                        },
                    },
                ],
            }],
        };

        debug!(model = %self.config.model, pdf_bytes = pdf.len(), "Calling Gemini");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|source| ExtractionError::Connection {
                provider: PROVIDER,
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Provider {
                provider: PROVIDER,
                status,
                message: provider_error_message(&body),
            });
        }

        let reply: GenerateContentResponse =
            response
                .json()
                .await
                .map_err(|source| ExtractionError::InvalidResponse {
                    provider: PROVIDER,
                    source,
                })?;

        let candidate = reply
            .candidates
            .into_iter()
            .next()
            .ok_or(ExtractionError::EmptyResponse { provider: PROVIDER })?;

        let text = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|part| part.text.unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        // Blocked candidates (finishReason SAFETY) come back without text
        let text = text.trim();
        if text.is_empty() {
            return Err(ExtractionError::EmptyResponse { provider: PROVIDER });
        }

        Ok(text.to_string())
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}
