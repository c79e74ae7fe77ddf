// Chat completion seam
// Message types and the trait the answerer and multi-query retriever call through


use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

/// Failure of a chat completion call
#[derive(Debug, Error)]
pub enum ChatError {
    /// The request was rejected as invalid, locally or by the API (HTTP 4xx)
    #[error("{0}")]
    Invalid(String),

    /// Transport failures, server errors and malformed responses
    #[error("Chat completion failed: {0}")]
    Request(#[from] anyhow::Error),
}

/// A hosted chat-completion model
pub trait ChatModel: Send + Sync {
    /// Run one completion and return the generated text, which may be empty
    fn complete(&self, request: &ChatRequest) -> Result<String, ChatError>;

    /// Identifier of the model answering requests
    fn model_name(&self) -> &str;
}
