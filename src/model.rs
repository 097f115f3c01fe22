//! Model-client abstraction for embedding and generative calls.
//!
//! The core never constructs a client ambiently: callers build one from an
//! explicit [`ModelConfig`] and inject it into the components that need it.
//! Two capabilities are exposed as traits so tests and alternative backends
//! can stand in:
//!
//! - [`CompletionModel`]: one-token completion with top-k logprob
//!   alternatives, the minimal neutral surface weight verification needs.
//! - [`Embedder`]: batch sentence embeddings for retrieval.
//!
//! [`HttpModelClient`] implements both against OpenAI-compatible
//! `/chat/completions` and `/embeddings` endpoints. Every request carries the
//! configured deadline; a transport timeout surfaces as [`ModelError::Timeout`]
//! rather than blocking, and response shapes are validated strictly: a
//! missing field is a parse error, never a defaulted value.

use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

/// Errors from the model-client subsystem.
#[derive(Debug, Error, Diagnostic)]
pub enum ModelError {
    #[error("model endpoint is not reachable at {url}")]
    #[diagnostic(
        code(maat::model::unavailable),
        help("Check the base_url in ModelConfig and that the service is running.")
    )]
    Unavailable { url: String },

    #[error("model request failed: {message}")]
    #[diagnostic(
        code(maat::model::request_failed),
        help("The endpoint rejected the request. Check the API key, model name, and payload limits.")
    )]
    RequestFailed { message: String },

    #[error("failed to parse model response: {message}")]
    #[diagnostic(
        code(maat::model::parse),
        help(
            "The response is missing a required field (choices, logprobs, or \
             embedding data). The endpoint may not support logprobs; use a \
             model that does."
        )
    )]
    Parse { message: String },

    #[error("model request timed out after {timeout_secs}s")]
    #[diagnostic(
        code(maat::model::timeout),
        help("Increase ModelConfig::timeout_secs or retry; the core never retries internally.")
    )]
    Timeout { timeout_secs: u64 },
}

/// Configuration for the HTTP model client.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Base URL of the OpenAI-compatible API.
    pub base_url: String,
    /// Bearer token for the API.
    pub api_key: String,
    /// Model used for YES/NO verification completions.
    pub completion_model: String,
    /// Model used for sentence embeddings.
    pub embedding_model: String,
    /// Sampling temperature; 0.0 keeps verification deterministic.
    pub temperature: f32,
    /// Completion length cap; verification needs a single token.
    pub max_tokens: u32,
    /// How many ranked alternatives to request per emitted token.
    pub top_logprobs: u32,
    /// Per-request deadline in seconds.
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key: String::new(),
            completion_model: "gpt-4o".into(),
            embedding_model: "text-embedding-3-small".into(),
            temperature: 0.0,
            max_tokens: 5,
            top_logprobs: 20,
            timeout_secs: 30,
        }
    }
}

/// One alternative token with its log-probability.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenLogprob {
    pub token: String,
    pub logprob: f64,
}

/// A single-token completion: the emitted token, its logprob, and the ranked
/// alternatives at the same position.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub token: String,
    pub logprob: f64,
    pub alternatives: Vec<TokenLogprob>,
}

/// A generative model capable of one-token completion with logprobs.
pub trait CompletionModel {
    fn complete(&self, prompt: &str) -> Result<Completion, ModelError>;
}

/// A sentence-embedding model. Must return exactly one vector per input, in
/// input order.
pub trait Embedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ModelError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// Client for OpenAI-compatible completion and embedding endpoints.
pub struct HttpModelClient {
    config: ModelConfig,
    agent: ureq::Agent,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    logprobs: ChoiceLogprobs,
}

#[derive(Deserialize)]
struct ChoiceLogprobs {
    content: Vec<TokenInfo>,
}

#[derive(Deserialize)]
struct TokenInfo {
    token: String,
    logprob: f64,
    #[serde(default)]
    top_logprobs: Vec<TokenLogprob>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

impl HttpModelClient {
    pub fn new(config: ModelConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build();
        Self { config, agent }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn post(&self, path: &str, body: serde_json::Value) -> Result<String, ModelError> {
        let url = format!("{}{path}", self.config.base_url);
        let response = self
            .agent
            .post(&url)
            .set("Authorization", &format!("Bearer {}", self.config.api_key))
            .set("Content-Type", "application/json")
            .send_string(&body.to_string())
            .map_err(|e| self.map_error(&url, e))?;
        response.into_string().map_err(|e| ModelError::Parse {
            message: format!("failed to read response body: {e}"),
        })
    }

    fn map_error(&self, url: &str, err: ureq::Error) -> ModelError {
        match err {
            ureq::Error::Status(code, response) => {
                let body = response.into_string().unwrap_or_default();
                ModelError::RequestFailed {
                    message: format!("HTTP {code}: {body}"),
                }
            }
            ureq::Error::Transport(transport) => {
                let message = transport.to_string();
                if message.contains("timed out") || message.contains("timeout") {
                    ModelError::Timeout {
                        timeout_secs: self.config.timeout_secs,
                    }
                } else {
                    ModelError::Unavailable {
                        url: url.to_string(),
                    }
                }
            }
        }
    }
}

impl CompletionModel for HttpModelClient {
    fn complete(&self, prompt: &str) -> Result<Completion, ModelError> {
        let body = serde_json::json!({
            "model": self.config.completion_model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "logprobs": true,
            "top_logprobs": self.config.top_logprobs,
        });

        let raw = self.post("/chat/completions", body)?;
        let parsed: ChatResponse =
            serde_json::from_str(&raw).map_err(|e| ModelError::Parse {
                message: e.to_string(),
            })?;

        let choice = parsed.choices.into_iter().next().ok_or(ModelError::Parse {
            message: "response has no choices".into(),
        })?;
        let first = choice
            .logprobs
            .content
            .into_iter()
            .next()
            .ok_or(ModelError::Parse {
                message: "response has no token logprobs".into(),
            })?;

        Ok(Completion {
            token: first.token,
            logprob: first.logprob,
            alternatives: first.top_logprobs,
        })
    }
}

impl Embedder for HttpModelClient {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ModelError> {
        let body = serde_json::json!({
            "model": self.config.embedding_model,
            "input": texts,
        });

        let raw = self.post("/embeddings", body)?;
        let parsed: EmbeddingResponse =
            serde_json::from_str(&raw).map_err(|e| ModelError::Parse {
                message: e.to_string(),
            })?;

        if parsed.data.len() != texts.len() {
            return Err(ModelError::Parse {
                message: format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    parsed.data.len()
                ),
            });
        }

        // The API reports an index per datum; order by it rather than
        // trusting response order.
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_response_parses_with_alternatives() {
        let raw = r#"{
            "choices": [{
                "message": {"content": "YES"},
                "logprobs": {"content": [{
                    "token": "YES",
                    "logprob": -0.05,
                    "top_logprobs": [
                        {"token": "YES", "logprob": -0.05},
                        {"token": "NO", "logprob": -3.2}
                    ]
                }]}
            }]
        }"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        let first = &parsed.choices[0].logprobs.content[0];
        assert_eq!(first.token, "YES");
        assert_eq!(first.top_logprobs.len(), 2);
    }

    #[test]
    fn chat_response_without_logprobs_is_parse_error() {
        let raw = r#"{"choices": [{"message": {"content": "YES"}}]}"#;
        assert!(serde_json::from_str::<ChatResponse>(raw).is_err());
    }

    #[test]
    fn embedding_response_sorts_by_index() {
        let raw = r#"{
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        }"#;
        let parsed: EmbeddingResponse = serde_json::from_str(raw).unwrap();
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        assert_eq!(data[0].embedding, vec![1.0, 0.0]);
    }
}
