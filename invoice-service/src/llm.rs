//! Invoice extraction through hosted language models.
//!
//! Gemini reads the PDF itself; Groq only sees text pulled out of the PDF
//! locally. Both are asked for a bare JSON object, which models still like to
//! wrap in markdown fences.

mod gemini;
mod groq;
pub mod prompts;

pub use gemini::GeminiClient;
pub use groq::GroqClient;

use strum::{Display, EnumString};

use crate::db::ExtractedInvoice;
use crate::error::ExtractionError;

/// Provider selected by the request's `model` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ExtractionModel {
    Gemini,
    Groq,
}

const FENCE: &str = "```";
const JSON_TAG: &str = "json";

/// Remove markdown code fences from model output.
///
/// Every "```json" marker (with one directly following newline) and every
/// other "```" is dropped, wherever it appears; the result is trimmed.
pub fn strip_code_fences(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(pos) = rest.find(FENCE) {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + FENCE.len()..];

        if let Some(after_tag) = rest.strip_prefix(JSON_TAG) {
            rest = after_tag.strip_prefix('\n').unwrap_or(after_tag);
        }
    }
    out.push_str(rest);

    out.trim().to_string()
}

/// Human-readable message from a provider's error body.
/// Both providers answer `{"error": {"message": ...}}`; anything else is kept verbatim.
pub(crate) fn provider_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Parse a model reply into invoice data
pub fn parse_extraction(raw: &str) -> Result<ExtractedInvoice, ExtractionError> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str(&cleaned).map_err(|source| ExtractionError::MalformedResponse {
        raw: raw.to_string(),
        source,
    })
}
