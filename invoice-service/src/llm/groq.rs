use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{prompts, provider_error_message};
use crate::config::GroqConfig;
use crate::error::{ExtractionError, ServiceResult};

const PROVIDER: &str = "Groq";

/// Groq client (OpenAI-compatible chat completions)
pub struct GroqClient {
    client: Client,
    config: GroqConfig,
}

impl GroqClient {
    pub fn new(config: GroqConfig) -> ServiceResult<Self> {
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

    /// Ask the model to structure the invoice text; returns the reply content
    pub async fn extract_from_text(&self, text: &str) -> Result<String, ExtractionError> {
        if !self.is_configured() {
            return Err(ExtractionError::NotConfigured { provider: PROVIDER });
        }

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let request = ChatCompletionRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompts::groq_extraction_prompt(text),
            }],
        };

        debug!(model = %self.config.model, text_chars = text.len(), "Calling Groq");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
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

        let completion: ChatCompletionResponse =
            response
                .json()
                .await
                .map_err(|source| ExtractionError::InvalidResponse {
                    provider: PROVIDER,
                    source,
                })?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ExtractionError::EmptyResponse { provider: PROVIDER })
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GroqClient {
        GroqClient::new(GroqConfig {
            api_key: "gsk-test".to_string(),
            base_url: format!("{}/openai/v1", server.uri()),
            model: "llama-3.3-70b-versatile".to_string(),
            temperature: 0.1,
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .and(header("authorization", "Bearer gsk-test"))
            .and(body_partial_json(json!({
                "model": "llama-3.3-70b-versatile",
                "messages": [{ "role": "user" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-1",
                "choices": [{
                    "index": 0,
                    "message": { "role": "assistant", "content": "{\"vendor\": {}}" },
                    "finish_reason": "stop"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client(&server)
            .extract_from_text("ACME LTD Invoice 42")
            .await
            .unwrap();
        assert_eq!(reply, "{\"vendor\": {}}");
    }

    #[tokio::test]
    async fn test_rate_limit_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "message": "Rate limit reached", "type": "tokens" }
            })))
            .mount(&server)
            .await;

        let err = client(&server).extract_from_text("text").await.unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::Provider { status: 429, ref message, .. } if message == "Rate limit reached"
        ));
    }

    #[tokio::test]
    async fn test_no_choices_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = client(&server).extract_from_text("text").await.unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyResponse { provider: "Groq" }));
    }
}
