
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

use crate::chat::{ChatError, ChatMessage, ChatModel, ChatRequest};
use crate::config::OpenAiConfig;
use crate::embeddings::Embedder;

const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Blocking client for the OpenAI embeddings and chat-completions endpoints
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    embeddings_url: Url,
    chat_url: Url,
    authorization: String,
    embedding_model: String,
    chat_model: String,
    batch_size: u32,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Failure of a single API request after retries
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
}

impl OpenAiClient {
    #[inline]
    pub fn new(config: &OpenAiConfig, api_key: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(anyhow!("OpenAI API key must not be empty"));
        }

        let embeddings_url = config
            .endpoint("embeddings")
            .context("Failed to build embeddings URL from config")?;
        let chat_url = config
            .endpoint("chat/completions")
            .context("Failed to build chat completions URL from config")?;

        Ok(Self {
            embeddings_url,
            chat_url,
            authorization: format!("Bearer {}", api_key.trim()),
            embedding_model: config.embedding_model.clone(),
            chat_model: config.chat_model.clone(),
            batch_size: config.batch_size,
            agent: Self::build_agent(Duration::from_secs(config.timeout_secs)),
            retry_attempts: config.retry_attempts.max(1),
        })
    }

    fn build_agent(timeout: Duration) -> ureq::Agent {
        ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into()
    }

    /// Generate embeddings for `texts`, one request per batch
    #[inline]
    pub fn create_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size as usize) {
            let vectors = self
                .create_embeddings_single_batch(batch)
                .with_context(|| format!("Failed to process batch of {} texts", batch.len()))?;
            results.extend(vectors);
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }

    fn create_embeddings_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingsRequest {
            model: &self.embedding_model,
            input: texts,
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize embeddings request")?;

        let response_text = self
            .make_request_with_retry(&self.embeddings_url, &request_json)
            .context("Failed to generate embeddings")?;

        let mut response: EmbeddingsResponse = serde_json::from_str(&response_text)
            .context("Failed to parse embeddings response")?;

        if response.data.len() != texts.len() {
            return Err(anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.data.len()
            ));
        }

        response.data.sort_by_key(|d| d.index);
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }

    /// Run a chat completion and return the first choice's text
    #[inline]
    pub fn create_chat_completion(&self, request: &ChatRequest) -> Result<String, ChatError> {
        let body = ChatCompletionRequest {
            model: &self.chat_model,
            messages: &request.messages,
            temperature: request.temperature,
        };
        let request_json = serde_json::to_string(&body)
            .context("Failed to serialize chat completion request")?;

        debug!(
            "Requesting chat completion from {} ({} messages, temperature {})",
            self.chat_model,
            request.messages.len(),
            request.temperature
        );

        let response_text = match self.make_request_with_retry(&self.chat_url, &request_json) {
            Ok(text) => text,
            Err(ApiError::Status { status, message }) if (400..500).contains(&status) => {
                return Err(ChatError::Invalid(message));
            }
            Err(e) => return Err(ChatError::Request(anyhow!(e))),
        };

        let response: ChatCompletionResponse = serde_json::from_str(&response_text)
            .context("Failed to parse chat completion response")?;

        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }

    fn make_request_with_retry(&self, url: &Url, body: &str) -> Result<String, ApiError> {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            let result = self
                .agent
                .post(url.as_str())
                .header("Authorization", &self.authorization)
                .header("Content-Type", "application/json")
                .send(body)
                .and_then(|mut resp| {
                    let status = resp.status().as_u16();
                    resp.body_mut().read_to_string().map(|text| (status, text))
                });

            match result {
                Ok((status, text)) if (200..300).contains(&status) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(text);
                }
                Ok((status, text)) => {
                    let error = ApiError::Status {
                        status,
                        message: extract_error_message(&text),
                    };
                    if status < 500 {
                        warn!("Client error (status {}), not retrying", status);
                        return Err(error);
                    }
                    warn!(
                        "Server error (status {}), attempt {}/{}",
                        status, attempt, self.retry_attempts
                    );
                    last_error = Some(error);
                }
                Err(
                    error @ (ureq::Error::ConnectionFailed
                    | ureq::Error::HostNotFound
                    | ureq::Error::Timeout(_)
                    | ureq::Error::Io(_)),
                ) => {
                    warn!(
                        "Transport error: {}, attempt {}/{}",
                        error, attempt, self.retry_attempts
                    );
                    last_error = Some(ApiError::Transport(error.to_string()));
                }
                Err(error) => {
                    warn!("Non-retryable error: {}", error);
                    return Err(ApiError::Transport(error.to_string()));
                }
            }

            if attempt < self.retry_attempts {
                let delay = Duration::from_millis(EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000);
                debug!("Waiting {:?} before retry", delay);
                std::thread::sleep(delay);
            }
        }

        error!("All retry attempts failed for request to {}", url);

        Err(last_error
            .unwrap_or_else(|| ApiError::Transport("Request failed after retries".to_string())))
    }
}

/// Pull the human-readable message out of an OpenAI error body
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body).map_or_else(
        |_| body.trim().to_string(),
        |response| response.error.message,
    )
}

impl Embedder for OpenAiClient {
    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.create_embeddings(texts)
    }

    #[inline]
    fn model_name(&self) -> &str {
        &self.embedding_model
    }
}

impl ChatModel for OpenAiClient {
    #[inline]
    fn complete(&self, request: &ChatRequest) -> Result<String, ChatError> {
        self.create_chat_completion(request)
    }

    #[inline]
    fn model_name(&self) -> &str {
        &self.chat_model
    }
}
