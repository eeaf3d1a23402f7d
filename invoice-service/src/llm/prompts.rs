//! Extraction prompts

const INSTRUCTIONS_TAIL: &str = "\
Do not include any explanatory text, markdown formatting, or anything else besides the JSON object.

The required JSON schema is:
{
  \"vendor\": { \"name\": \"string\", \"address\": \"string\", \"taxId\": \"string\" },
  \"invoice\": {
    \"number\": \"string\",
    \"date\": \"string\",
    \"currency\": \"string\",
    \"subtotal\": \"number\",
    \"taxPercent\": \"number\",
    \"total\": \"number\",
    \"poNumber\": \"string\",
    \"poDate\": \"string\",
    \"lineItems\": [{ \"description\": \"string\", \"unitPrice\": \"number\", \"quantity\": \"number\", \"total\": \"number\" }]
  }
}
";

/// Prompt sent alongside the inline PDF
pub fn gemini_extraction_prompt() -> String {
    format!(
        "You are an expert data extraction AI.\n\
         Based on the provided PDF invoice file, extract the following information and return it as a clean JSON object.\n\
         {}",
        INSTRUCTIONS_TAIL
    )
}

/// Prompt carrying the invoice text extracted from the PDF
pub fn groq_extraction_prompt(text: &str) -> String {
    format!(
        "You are an expert data extraction AI.\n\
         Extract the following information from the provided invoice text and return it as a clean JSON object.\n\
         {}\n\
         Invoice Text:\n\
         ---\n\
         {}\n\
         ---\n",
        INSTRUCTIONS_TAIL, text
    )
}
