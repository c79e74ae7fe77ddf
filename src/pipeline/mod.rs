// Request handling
// Validates a question, opens the index, retrieves context and asks for an answer


use anyhow::Result;
use indicatif::ProgressBar;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::answer::{Answerer, validate_temperature};
use crate::chat::{ChatError, ChatModel};
use crate::config::Config;
use crate::embeddings::Embedder;
use crate::index::open_or_build;
use crate::openai::OpenAiClient;
use crate::retrieval::build_retriever;

pub const DEFAULT_TEMPERATURE: f32 = 0.5;

/// One question from the user
#[derive(Clone, PartialEq)]
pub struct QueryRequest {
    pub query: String,
    pub temperature: f32,
    pub api_key: Option<String>,
}

impl QueryRequest {
    #[inline]
    pub fn new(query: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            query: query.into(),
            temperature: DEFAULT_TEMPERATURE,
            api_key,
        }
    }

    #[inline]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

// Keeps the key out of logs
impl fmt::Debug for QueryRequest {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryRequest")
            .field("query", &self.query)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request was invalid, locally or according to the API
    Validation,
    /// Anything else went wrong while generating the answer
    Upstream,
}

/// What the user sees for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Answered(String),
    MissingApiKey,
    MissingQuery,
    EmptyResponse,
    Failed { kind: FailureKind, reason: String },
}

impl QueryOutcome {
    /// The text shown for this outcome
    #[inline]
    pub fn message(&self) -> String {
        match self {
            Self::Answered(text) => text.clone(),
            Self::MissingApiKey => "Please provide the open ai api key !".to_string(),
            Self::MissingQuery => "Please provide the search query !".to_string(),
            Self::EmptyResponse => "No response from LLM !".to_string(),
            Self::Failed {
                kind: FailureKind::Validation,
                reason,
            } => format!("An error occured: {}", reason),
            Self::Failed {
                kind: FailureKind::Upstream,
                ..
            } => "No response from LLM !".to_string(),
        }
    }

    #[inline]
    pub fn is_answered(&self) -> bool {
        matches!(self, Self::Answered(_))
    }

    fn from_chat_result(result: Result<String, ChatError>) -> Self {
        match result {
            Ok(text) if text.trim().is_empty() => {
                warn!("Chat model returned an empty answer");
                Self::EmptyResponse
            }
            Ok(text) => Self::Answered(text),
            Err(ChatError::Invalid(reason)) => {
                error!("Answer request rejected: {}", reason);
                Self::Failed {
                    kind: FailureKind::Validation,
                    reason,
                }
            }
            Err(e @ ChatError::Request(_)) => {
                error!("Answer request failed: {}", e);
                Self::Failed {
                    kind: FailureKind::Upstream,
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Embedder and chat model created for one API key
#[derive(Clone)]
pub struct ModelClients {
    pub embedder: Arc<dyn Embedder>,
    pub chat: Arc<dyn ChatModel>,
}

/// Creates model clients for a request's credentials
pub trait ModelProvider: Send + Sync {
    fn clients(&self, config: &Config, api_key: &str) -> Result<ModelClients>;
}

/// Hosted OpenAI models
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiProvider;

impl ModelProvider for OpenAiProvider {
    #[inline]
    fn clients(&self, config: &Config, api_key: &str) -> Result<ModelClients> {
        let client = Arc::new(OpenAiClient::new(&config.openai, api_key)?);
        Ok(ModelClients {
            embedder: Arc::clone(&client) as Arc<dyn Embedder>,
            chat: client,
        })
    }
}

/// Handles questions end to end against one configuration
pub struct Pipeline {
    config: Config,
    provider: Box<dyn ModelProvider>,
    progress: ProgressBar,
}

impl Pipeline {
    #[inline]
    pub fn new(config: Config, provider: Box<dyn ModelProvider>) -> Self {
        Self {
            config,
            provider,
            progress: ProgressBar::hidden(),
        }
    }

    /// Report index loading and building on `progress`
    #[inline]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Answer one question
    ///
    /// Missing input and answer-generation failures come back as a [`QueryOutcome`].
    /// Index and retrieval failures are returned as errors.
    #[inline]
    pub async fn handle(&self, request: &QueryRequest) -> Result<QueryOutcome> {
        let Some(api_key) = request
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
        else {
            debug!("Rejecting request without API key");
            return Ok(QueryOutcome::MissingApiKey);
        };

        let query = request.query.trim();
        if query.is_empty() {
            debug!("Rejecting request without query");
            return Ok(QueryOutcome::MissingQuery);
        }

        if let Err(e) = validate_temperature(request.temperature) {
            return Ok(QueryOutcome::from_chat_result(Err(e)));
        }

        let clients = self.provider.clients(&self.config, api_key)?;
        let index = open_or_build(&self.config, clients.embedder, &self.progress).await?;

        let retriever = build_retriever(
            &self.config.retrieval,
            Arc::clone(&clients.chat),
            request.temperature,
        );
        let context = retriever.retrieve(&index, query).await?;
        if context.is_empty() {
            warn!("No context retrieved for query, answering without context");
        }
        info!("Retrieved {} context chunks", context.len());

        let answerer = Answerer::new(clients.chat);
        Ok(QueryOutcome::from_chat_result(answerer.answer(
            &context,
            query,
            request.temperature,
        )))
    }
}
