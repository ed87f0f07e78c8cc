//! Text-generation backends.
//!
//! Every backend implements `LlmClient`; backend-specific failures are
//! normalized to `GenerationError` so callers never see provider error
//! types. `MockLlm` is the deterministic offline stub used in tests and
//! the `--offline` batch mode.

use serde::{Deserialize, Serialize};

use super::GenerationError;

/// Text-generation backend abstraction (allows mocking).
///
/// Implementations are expected to return JSON text — an object or array
/// depending on the head's shape. Contract violations are the caller's
/// problem to detect; transport failures are normalized here.
pub trait LlmClient: Send + Sync {
    fn generate(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, GenerationError>;
}

/// OpenRouter-compatible chat-completions client.
pub struct OpenRouterClient {
    base_url: String,
    api_key: String,
    model_id: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OpenRouterClient {
    pub fn new(api_key: &str, model_id: &str, timeout_secs: u64) -> Result<Self, GenerationError> {
        Self::with_base_url("https://openrouter.ai/api/v1", api_key, model_id, timeout_secs)
    }

    pub fn with_base_url(
        base_url: &str,
        api_key: &str,
        model_id: &str,
        timeout_secs: u64,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GenerationError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model_id: model_id.to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl LlmClient for OpenRouterClient {
    fn generate(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model_id,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
            max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    GenerationError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    GenerationError::Timeout(self.timeout_secs)
                } else {
                    GenerationError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerationError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| GenerationError::MalformedResponse("empty choices array".into()))
    }
}

/// Deterministic offline stub — picks a canned JSON response per head by
/// inspecting the prompt, so the full pipeline runs without a network.
pub struct MockLlm;

impl MockLlm {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmClient for MockLlm {
    fn generate(
        &self,
        prompt: &str,
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<String, GenerationError> {
        // Template instruction phrases are checked before key-name
        // fallbacks: context text is substituted into the prompt and can
        // mention words like "dataset" without being the results head.
        if prompt.contains("Extract evaluation results") {
            return Ok(Self::results_json());
        }
        if prompt.contains("METHODS/ARCHITECTURE") {
            return Ok(Self::methods_json());
        }
        if prompt.contains("Extract the paper's limitations") {
            return Ok(Self::limitations_json());
        }
        if prompt.contains("Extract title") {
            return Ok(Self::metadata_json());
        }
        if prompt.contains("concise summary") {
            return Ok(Self::summary_json());
        }
        // Fallbacks for custom templates that dropped the stock wording.
        if prompt.contains("\"dataset\"") {
            return Ok(Self::results_json());
        }
        if prompt.contains("\"methods\"") {
            return Ok(Self::methods_json());
        }
        if prompt.contains("\"limitations\"") {
            return Ok(Self::limitations_json());
        }
        if prompt.contains("\"title\"") {
            return Ok(Self::metadata_json());
        }
        if prompt.contains("\"summary\"") {
            return Ok(Self::summary_json());
        }
        Ok("{}".to_string())
    }
}

impl MockLlm {
    fn results_json() -> String {
        serde_json::json!([{
            "dataset": "TinyImageNet",
            "metric": "Accuracy",
            "value": 78.4,
            "unit": "%",
            "split": "test",
            "higher_is_better": true,
            "baseline": "ResNet18",
            "ours_is": "HybridAttentionNet",
            "confidence": 0.92
        }])
        .to_string()
    }

    fn methods_json() -> String {
        serde_json::json!({
            "methods": [{
                "name": "HybridAttentionNet",
                "category": "Transformer+CNN",
                "components": ["ConvStem", "MHA", "RoPE"],
                "description": "ConvStem + light transformer blocks using RoPE."
            }]
        })
        .to_string()
    }

    fn limitations_json() -> String {
        serde_json::json!({
            "limitations": "Evaluation limited to small datasets.",
            "ethics": "No major ethical issues identified."
        })
        .to_string()
    }

    fn metadata_json() -> String {
        serde_json::json!({
            "title": "Hybrid Attention for Efficient Image Classification",
            "authors": ["Bhavesh Kumar", "Jane Doe"],
            "year": 2023,
            "venue": "ImaginaryConf",
            "arxiv_id": "arXiv:2301.00001"
        })
        .to_string()
    }

    fn summary_json() -> String {
        serde_json::json!({
            "summary": "We introduce HybridAttentionNet, a hybrid conv+transformer model \
                        that achieves 78.4% test accuracy on TinyImageNet, outperforming \
                        ResNet18. Evaluation is limited to smaller datasets."
        })
        .to_string()
    }
}

/// Test helper: returns a fixed response regardless of prompt.
pub struct CannedLlm {
    response: String,
}

impl CannedLlm {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
        }
    }
}

impl LlmClient for CannedLlm {
    fn generate(&self, _: &str, _: f32, _: u32) -> Result<String, GenerationError> {
        Ok(self.response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_returns_metadata_for_title_prompt() {
        let response = MockLlm::new()
            .generate("Extract title, authors, year from:\n...", 0.0, 512)
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&response).unwrap();
        assert_eq!(
            parsed["title"],
            "Hybrid Attention for Efficient Image Classification"
        );
    }

    #[test]
    fn mock_returns_array_for_results_prompt() {
        let response = MockLlm::new()
            .generate("Extract evaluation results as a JSON array ...", 0.0, 512)
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&response).unwrap();
        assert!(parsed.is_array());
        assert_eq!(parsed[0]["value"], serde_json::json!(78.4));
    }

    #[test]
    fn mock_falls_back_to_empty_object() {
        let response = MockLlm::new().generate("unrecognized prompt", 0.0, 512).unwrap();
        assert_eq!(response, "{}");
    }

    #[test]
    fn canned_client_echoes_response() {
        let client = CannedLlm::new("{\"summary\": \"s\"}");
        assert_eq!(client.generate("x", 0.0, 1).unwrap(), "{\"summary\": \"s\"}");
    }

    #[test]
    fn openrouter_client_trims_trailing_slash() {
        let client =
            OpenRouterClient::with_base_url("http://localhost:9999/", "k", "model", 30).unwrap();
        assert_eq!(client.base_url, "http://localhost:9999");
        assert_eq!(client.model_id(), "model");
    }
}
