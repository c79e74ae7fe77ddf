
use std::sync::Arc;
use tracing::debug;

use crate::chat::{ChatError, ChatMessage, ChatModel, ChatRequest};
use crate::retrieval::RetrievedChunk;

pub const SYSTEM_PROMPT: &str = "You have to answer question based on context given";

/// Produces an answer to a question from retrieved context
pub struct Answerer {
    chat: Arc<dyn ChatModel>,
}

impl Answerer {
    #[inline]
    pub fn new(chat: Arc<dyn ChatModel>) -> Self {
        Self { chat }
    }

    /// Ask the chat model to answer `query` from `context`
    ///
    /// The returned text may be empty when the model produced nothing.
    #[inline]
    pub fn answer(
        &self,
        context: &[RetrievedChunk],
        query: &str,
        temperature: f32,
    ) -> Result<String, ChatError> {
        validate_temperature(temperature)?;

        let request = build_request(context, query, temperature);
        debug!(
            "Answering with {} context chunks using {}",
            context.len(),
            self.chat.model_name()
        );
        self.chat.complete(&request)
    }
}

#[inline]
pub fn validate_temperature(temperature: f32) -> Result<(), ChatError> {
    if (0.0..=1.0).contains(&temperature) {
        Ok(())
    } else {
        Err(ChatError::Invalid(format!(
            "temperature must be between 0.0 and 1.0, got {}",
            temperature
        )))
    }
}

/// Retrieved chunk contents joined by blank lines
#[inline]
pub fn format_context(context: &[RetrievedChunk]) -> String {
    context
        .iter()
        .map(|hit| hit.chunk.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[inline]
pub fn build_request(context: &[RetrievedChunk], query: &str, temperature: f32) -> ChatRequest {
    ChatRequest {
        messages: vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Given the context: {}, please answer the following question {}.",
                format_context(context),
                query
            )),
        ],
        temperature,
    }
}
