// src/llm_extract.rs

use crate::config::{LlmBackend, LlmSection};
use crate::error::{Result, SchemeError};
use crate::scheme::SchemeFields;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const NO_TABLE_DATA: &str = "No table data available";
pub const NO_SHEET_DATA: &str = "No XLSX data provided";

/// Instructions for the field extraction call.
const SYSTEM_PROMPT: &str = r#"You extract retail trade scheme details from vendor emails.
You receive the cleaned email text, table data and spreadsheet data. Return ONLY one JSON
object whose values are all strings, with these keys:

  scheme_type            one of BUY_SIDE, SELL_SIDE, ONE_OFF, PDC
  scheme_subtype         one of PERIODIC_CLAIM, PDC, PUC, CP, SC, PRX, BOC, LS, N/A
  scheme_name            short name of the scheme
  scheme_description     10-15 word summary of the scheme's purpose
  scheme_period          Duration or Event
  duration               DD/MM/YYYY to DD/MM/YYYY
  discount_type          Percentage of NLC, Percentage of MRP, Absolute or Not Specified
  max_cap                maximum support amount, or No Cap
  vendor_name            brand or company name, never a contact person
  price_drop_date        DD/MM/YYYY for price drop schemes, else N/A
  start_date, end_date   DD/MM/YYYY
  fsn_file_config_file   Yes if FSNs, SKUs or model lists are mentioned, else No
  min_actual_discount_or_agreed_claim   TRUE if "whichever is lower" applies, else FALSE
  remove_gst_from_final_claim           Yes, No or Not Specified
  over_and_above         TRUE only if stated as over and above, else FALSE
  discount_slab_type     slab description, periodic claims only
  best_bet               best bet incentive, periodic claims only
  brand_support_absolute absolute support amount, one-off claims only
  gst_rate               GST percentage, one-off claims only
  model_name             product model the scheme applies to
  fsn_list               FSN codes found in the text, separated by commas, or None
  config_brand_support, config_max_quantity, config_unit_slab_lower,
  config_unit_slab_upper, config_max_support_value, config_vendor_split_ratio,
  config_margin, config_incoming_fsn, config_exchange_slab_from,
  config_exchange_slab_to, config_agreed_support, config_best_bet_quantity
                         numeric configuration values when stated, else omit

Use "Not Specified" for values you cannot determine. No markdown fences, no commentary."#;

/// The three texts handed to an extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionInput {
    pub email_text: String,
    pub table_text: String,
    pub sheet_text: String,
}

impl ExtractionInput {
    /// Missing or blank table and sheet texts become placeholders.
    pub fn new(email_text: &str, table_text: Option<&str>, sheet_text: Option<&str>) -> Self {
        Self {
            email_text: email_text.to_string(),
            table_text: or_placeholder(table_text, NO_TABLE_DATA),
            sheet_text: or_placeholder(sheet_text, NO_SHEET_DATA),
        }
    }

    /// Sectioned prompt body, before any length cap.
    pub fn render(&self) -> String {
        format!(
            "EMAIL TEXT:\n{}\n\nTABLE DATA:\n{}\n\nXLSX DATA:\n{}",
            self.email_text, self.table_text, self.sheet_text
        )
    }
}

fn or_placeholder(text: Option<&str>, placeholder: &str) -> String {
    match text.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => placeholder.to_string(),
    }
}

/// Anything that turns document text into a field bag.
#[async_trait]
pub trait FieldSource: Send + Sync {
    fn name(&self) -> &str;

    async fn extract(&self, input: &ExtractionInput) -> Result<SchemeFields>;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Resolved endpoint configuration ready to make API calls.
#[derive(Debug, Clone)]
struct ResolvedEndpoint {
    base_url: String,
    model: String,
    api_key: String,
}

/// `None` when the keyword backend is selected.
fn resolve_endpoint(llm: &LlmSection) -> Result<Option<ResolvedEndpoint>> {
    match llm.backend {
        LlmBackend::Keywords => Ok(None),
        LlmBackend::Ollama => {
            info!(
                url = %llm.ollama.base_url,
                model = %llm.ollama.model,
                "Using Ollama (local) backend"
            );
            Ok(Some(ResolvedEndpoint {
                base_url: llm.ollama.base_url.clone(),
                model: llm.ollama.model.clone(),
                api_key: "ollama".to_string(), // required by API but ignored
            }))
        }
        LlmBackend::Remote => {
            let var = llm
                .remote
                .api_key_env
                .as_deref()
                .unwrap_or("OPENROUTER_API_KEY");
            let api_key = std::env::var(var).map_err(|_| {
                SchemeError::Llm(format!("{var} env var required for remote backend"))
            })?;
            info!(
                url = %llm.remote.base_url,
                model = %llm.remote.model,
                "Using remote API backend"
            );
            Ok(Some(ResolvedEndpoint {
                base_url: llm.remote.base_url.clone(),
                model: llm.remote.model.clone(),
                api_key,
            }))
        }
    }
}

/// Check if the Ollama server is reachable.
async fn check_ollama_health(client: &Client, base_url: &str) -> bool {
    // Ollama's health endpoint is at the root (not under /v1)
    let health_url = base_url.trim_end_matches('/').trim_end_matches("/v1");

    match client
        .get(health_url)
        .timeout(std::time::Duration::from_secs(3))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            info!("Ollama server is reachable");
            true
        }
        Ok(resp) => {
            warn!(status = %resp.status(), "Ollama server returned non-OK status");
            false
        }
        Err(e) => {
            warn!(error = %e, "Ollama server not reachable");
            false
        }
    }
}

/// OpenAI-compatible chat completion extractor.
pub struct ChatFieldSource {
    client: Client,
    endpoint: ResolvedEndpoint,
    backend: LlmBackend,
    temperature: f64,
    max_tokens: u32,
    max_input_chars: usize,
}

impl ChatFieldSource {
    /// `None` for the keyword backend.
    pub fn from_config(llm: &LlmSection) -> Result<Option<Self>> {
        let Some(endpoint) = resolve_endpoint(llm)? else {
            return Ok(None);
        };
        Ok(Some(Self {
            client: Client::new(),
            endpoint,
            backend: llm.backend,
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
            max_input_chars: llm.max_input_chars,
        }))
    }

    /// Health check for local backends; remote endpoints are assumed up.
    pub async fn ensure_ready(&self) -> Result<()> {
        if self.backend == LlmBackend::Ollama
            && !check_ollama_health(&self.client, &self.endpoint.base_url).await
        {
            return Err(SchemeError::Llm(format!(
                "Ollama is not running at {}. Start it with: ollama serve",
                self.endpoint.base_url
            )));
        }
        Ok(())
    }

    fn user_prompt(&self, input: &ExtractionInput) -> String {
        truncate_chars(&input.render(), self.max_input_chars).to_string()
    }
}

#[async_trait]
impl FieldSource for ChatFieldSource {
    fn name(&self) -> &str {
        &self.endpoint.model
    }

    async fn extract(&self, input: &ExtractionInput) -> Result<SchemeFields> {
        let request = ChatRequest {
            model: self.endpoint.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: self.user_prompt(input),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let url = format!("{}/chat/completions", self.endpoint.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.endpoint.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SchemeError::Llm(format!("LLM API error {status}: {body}")));
        }

        let chat_response: ChatResponse = response.json().await?;
        let content = chat_response
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| SchemeError::Llm("Empty response from LLM".into()))?;

        let fields = parse_fields_response(content)?;
        let (filled, total) = fields.coverage();
        info!(filled, total, model = %self.endpoint.model, "LLM extraction result");
        Ok(fields)
    }
}

/// Field bag from a model reply that may carry fences or reasoning text.
pub fn parse_fields_response(content: &str) -> Result<SchemeFields> {
    // Strip markdown fences if the model added them despite instructions
    let json_str = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let json_str = extract_json_object(json_str)?;

    let value: serde_json::Value = serde_json::from_str(json_str).map_err(|e| {
        SchemeError::Llm(format!("Failed to parse LLM response: {e}\nRaw: {json_str}"))
    })?;
    let map = value
        .as_object()
        .ok_or_else(|| SchemeError::Llm("LLM response is not a JSON object".into()))?;

    Ok(SchemeFields::from_json_map(map))
}

/// Extract the outermost JSON object from a string that may contain
/// surrounding text (e.g. thinking tokens from qwen3).
fn extract_json_object(s: &str) -> Result<&str> {
    let start = s
        .find('{')
        .ok_or_else(|| SchemeError::Llm("No '{' found in LLM response".into()))?;
    let end = s
        .rfind('}')
        .ok_or_else(|| SchemeError::Llm("No '}' found in LLM response".into()))?;
    if end <= start {
        return Err(SchemeError::Llm("Malformed JSON in LLM response".into()));
    }
    Ok(&s[start..=end])
}

/// At most `max` characters, cut on a char boundary.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointSection;
    use crate::scheme::SchemeField;

    #[test]
    fn test_placeholders() {
        let input = ExtractionInput::new("body", None, Some("  "));
        assert_eq!(input.table_text, NO_TABLE_DATA);
        assert_eq!(input.sheet_text, NO_SHEET_DATA);
        let input = ExtractionInput::new("body", Some("a,b"), None);
        assert_eq!(input.table_text, "a,b");
        assert_eq!(input.email_text, "body");
    }

    #[test]
    fn test_parse_fenced_response() {
        let reply = "```json\n{\"scheme_type\": \"SELL_SIDE\", \"scheme_subtype\": \"PUC/FDC\", \"config_margin\": 12}\n```";
        let fields = parse_fields_response(reply).unwrap();
        assert_eq!(fields.get(SchemeField::SchemeType), "SELL_SIDE");
        assert_eq!(fields.get(SchemeField::SchemeSubtype), "PUC/FDC");
        assert_eq!(fields.get(SchemeField::ConfigMargin), "12");
    }

    #[test]
    fn test_parse_with_reasoning_prefix() {
        let reply = "<think>vendor is Campus</think>\n{\"vendor_name\": \"Campus\"}";
        let fields = parse_fields_response(reply).unwrap();
        assert_eq!(fields.get(SchemeField::VendorName), "Campus");
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(parse_fields_response("I could not find anything").is_err());
        assert!(parse_fields_response("} {").is_err());
        assert!(parse_fields_response("{not json}").is_err());
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate_chars("₹₹₹₹", 2), "₹₹");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_keyword_backend_has_no_endpoint() {
        let llm = LlmSection::default();
        assert!(ChatFieldSource::from_config(&llm).unwrap().is_none());
    }

    #[test]
    fn test_remote_requires_key() {
        let llm = LlmSection {
            backend: LlmBackend::Remote,
            remote: EndpointSection {
                base_url: "https://example.test/v1".into(),
                model: "m".into(),
                api_key_env: Some("SCHEME_EXTRACT_TEST_UNSET_KEY".into()),
            },
            ..LlmSection::default()
        };
        assert!(matches!(
            ChatFieldSource::from_config(&llm),
            Err(SchemeError::Llm(_))
        ));
    }

    #[tokio::test]
    async fn test_ollama_endpoint_prompt_truncated() {
        let llm = LlmSection {
            backend: LlmBackend::Ollama,
            max_input_chars: 20,
            ..LlmSection::default()
        };
        let source = ChatFieldSource::from_config(&llm).unwrap().unwrap();
        assert_eq!(source.name(), "qwen3:8b");
        let prompt = source.user_prompt(&ExtractionInput::new(&"x".repeat(100), None, None));
        assert_eq!(prompt.chars().count(), 20);
    }
}
