use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::types::{
    ApiError, ChatMessage, ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse,
    ErrorBody, GenerationRequest,
};
use crate::config::{ApiKey, Config};

/// Inputs longer than this are cut before submission to stay under the model's token limit.
pub const MAX_EMBED_CHARS: usize = 8000;
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("OPENAI_API_KEY not set")]
    ApiKeyNotSet,

    #[error("AI provider rate limit exceeded. Please retry later.")]
    RateLimited,

    #[error("AI provider error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("AI provider returned an empty {0}")]
    EmptyResponse(&'static str),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Abstraction over a chat-completion endpoint.
/// Implemented by `OpenAiClient` for production; mock implementations used in tests.
pub trait TextGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, AiError>;
}

/// Abstraction over an embedding endpoint returning one vector per input text.
pub trait Embedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError>;
}

#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    api_key: ApiKey,
    base_url: String,
    chat_model: String,
    embedding_model: String,
    backoff_ms: u64,
}

impl OpenAiClient {
    pub fn from_config(http: Client, config: &Config) -> Result<Self, AiError> {
        let api_key = config.ai_credential.clone().ok_or(AiError::ApiKeyNotSet)?;
        Ok(Self {
            http,
            api_key,
            base_url: config.ai_base_url.clone(),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            backoff_ms: INITIAL_BACKOFF_MS,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey::new("test-key"),
            base_url: base_url.to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            backoff_ms: 5,
        }
    }

    async fn post_once<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, AiError> {
        let url = format!("{}{path}", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .header("User-Agent", crate::USER_AGENT)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("AI provider rate limited");
            return Err(AiError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|b| b.error)
                .map(describe_api_error)
                .unwrap_or_else(|| text.chars().take(200).collect());
            warn!(status = %status, "AI provider error");
            return Err(AiError::Api {
                code: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, AiError> {
        let mut last_err = None;
        for attempt in 0..MAX_RETRIES {
            match self.post_once(path, body).await {
                Ok(response) => return Ok(response),
                Err(e) if is_retriable(&e) => {
                    last_err = Some(e);
                    if attempt + 1 < MAX_RETRIES {
                        let delay_ms = jittered_backoff(self.backoff_ms, attempt);
                        debug!(
                            attempt = attempt + 1,
                            delay_ms, "retrying after transient error"
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(AiError::RateLimited))
    }
}

impl TextGenerator for OpenAiClient {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, AiError> {
        let body = ChatRequest {
            model: &self.chat_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system,
                },
                ChatMessage {
                    role: "user",
                    content: request.user,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response: ChatResponse = self.post("/chat/completions", &body).await?;
        if let Some(err) = response.error {
            return Err(AiError::Api {
                code: 0,
                message: describe_api_error(err),
            });
        }

        let text = response
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(AiError::EmptyResponse("completion"))?;

        debug!(model = %self.chat_model, chars = text.len(), "completion received");
        Ok(text)
    }
}

impl Embedder for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError> {
        let input = truncate_chars(text, MAX_EMBED_CHARS);
        let body = EmbeddingRequest {
            model: &self.embedding_model,
            input,
        };

        let response: EmbeddingResponse = self.post("/embeddings", &body).await?;
        if let Some(err) = response.error {
            return Err(AiError::Api {
                code: 0,
                message: describe_api_error(err),
            });
        }

        response
            .data
            .and_then(|d| d.into_iter().next())
            .map(|d| d.embedding)
            .filter(|v| !v.is_empty())
            .ok_or(AiError::EmptyResponse("embedding"))
    }
}

fn describe_api_error(err: ApiError) -> String {
    match (err.kind, err.message) {
        (Some(kind), Some(message)) => format!("{kind}: {message}"),
        (None, Some(message)) => message,
        (Some(kind), None) => kind,
        (None, None) => "Unknown error".to_string(),
    }
}

fn is_retriable(e: &AiError) -> bool {
    matches!(
        e,
        AiError::RateLimited
            | AiError::Api {
                code: 500..=599,
                ..
            }
    )
}

/// Equal jitter backoff: base/2 + rand(0, base/2).
fn jittered_backoff(initial_ms: u64, attempt: u32) -> u64 {
    let base = initial_ms * 2u64.pow(attempt);
    let half = base / 2;
    half + fastrand::u64(..half.max(1))
}

/// Cut to at most `max` characters without splitting a UTF-8 sequence.
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}


#[cfg(test)]
mod http_tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn generate_returns_trimmed_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({"max_tokens": 150})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "  graph neural networks GNN  "}}]
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::with_base_url(Client::new(), &server.uri());
        let text = client
            .generate(&GenerationRequest {
                system: "s",
                user: "u",
                max_tokens: 150,
                temperature: 0.3,
            })
            .await
            .unwrap();
        assert_eq!(text, "graph neural networks GNN");
    }

    #[tokio::test]
    async fn embed_returns_first_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(serde_json::json!({"model": "text-embedding-3-small"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"index": 0, "embedding": [0.1, 0.2, 0.3]}]
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::with_base_url(Client::new(), &server.uri());
        let v = client.embed("text").await.unwrap();
        assert_eq!(v, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn embed_empty_data_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&server)
            .await;

        let client = OpenAiClient::with_base_url(Client::new(), &server.uri());
        assert!(matches!(
            client.embed("text").await,
            Err(AiError::EmptyResponse("embedding"))
        ));
    }

    #[tokio::test]
    async fn rate_limit_is_retried_then_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let client = OpenAiClient::with_base_url(Client::new(), &server.uri());
        assert!(matches!(client.embed("text").await, Err(AiError::RateLimited)));
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::with_base_url(Client::new(), &server.uri());
        let result = client
            .generate(&GenerationRequest {
                system: "s",
                user: "u",
                max_tokens: 10,
                temperature: 0.0,
            })
            .await;
        match result {
            Err(AiError::Api { code: 401, message }) => {
                assert!(message.contains("Incorrect API key"), "got: {message}");
            }
            other => panic!("expected Api(401), got: {other:?}"),
        }
    }
}
