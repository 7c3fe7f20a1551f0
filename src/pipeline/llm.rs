//! LLM interaction: single-turn sessions and text accumulation.
//!
//! A session yields a stream of [`SessionMessage`]s. Only text blocks of
//! assistant messages carry the answer; everything else (tool traffic,
//! system notices) is skipped. [`run_prompt`] drains the stream and returns
//! the concatenated text, so callers never see partial output.
//!
//! Prompt wording lives in [`crate::prompts`]; JSON handling in
//! [`crate::pipeline::postprocess`].

use crate::config::ServerConfig;
use crate::error::WorkbookError;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::Stream;
use tracing::{debug, warn};

/// One content segment of an assistant message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    Text(String),
    /// Any non-text segment (tool use, images, thinking, ...).
    Other,
}

/// A message emitted by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMessage {
    Assistant(Vec<ContentBlock>),
    /// Anything not authored by the assistant (system, user echo, result).
    Other,
}

impl SessionMessage {
    /// Shorthand for an assistant message with a single text block.
    pub fn assistant_text(text: impl Into<String>) -> Self {
        SessionMessage::Assistant(vec![ContentBlock::Text(text.into())])
    }
}

/// A boxed stream of session messages.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<SessionMessage, WorkbookError>> + Send>>;

/// Parameters of one session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub prompt: String,
    pub system_prompt: String,
    /// Hard cap on conversational turns. Always 1 for the workbook operations.
    pub max_turns: u32,
}

/// Something that can run a prompt and stream back messages.
///
/// The production implementation is [`ProviderSession`]; tests substitute
/// canned streams.
pub trait LlmSession: Send + Sync {
    fn query(&self, request: SessionRequest) -> MessageStream;
}

/// Run one single-turn session and return all assistant text, in order.
///
/// Any error from the stream aborts the call as [`WorkbookError::PromptFailed`]
/// carrying the original message.
pub async fn run_prompt(
    session: &dyn LlmSession,
    prompt: String,
    system_prompt: &str,
) -> Result<String, WorkbookError> {
    let start = Instant::now();
    let mut stream = session.query(SessionRequest {
        prompt,
        system_prompt: system_prompt.to_string(),
        max_turns: 1,
    });

    let mut text = String::new();
    let mut messages = 0usize;
    while let Some(message) = stream.next().await {
        let message = message.map_err(|e| match e {
            e @ WorkbookError::PromptFailed { .. } => e,
            other => WorkbookError::PromptFailed {
                message: other.to_string(),
            },
        })?;
        messages += 1;
        if let SessionMessage::Assistant(blocks) = message {
            for block in blocks {
                if let ContentBlock::Text(t) = block {
                    text.push_str(&t);
                }
            }
        }
    }

    debug!(
        "Session finished: {} messages, {} chars, {:?}",
        messages,
        text.len(),
        start.elapsed()
    );
    Ok(text)
}

/// [`LlmSession`] backed by an `edgequake-llm` provider.
///
/// Each query is one `chat` completion, so the single-turn cap holds by
/// construction; the response becomes one assistant message.
#[derive(Clone)]
pub struct ProviderSession {
    provider: Arc<dyn LLMProvider>,
    temperature: Option<f32>,
    max_tokens: usize,
}

impl ProviderSession {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ServerConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

impl LlmSession for ProviderSession {
    fn query(&self, request: SessionRequest) -> MessageStream {
        let provider = Arc::clone(&self.provider);
        let options = build_options(self.temperature, self.max_tokens);
        if request.max_turns != 1 {
            warn!(
                "Provider sessions are single-turn; ignoring max_turns={}",
                request.max_turns
            );
        }

        Box::pin(stream::once(async move {
            let messages = vec![
                ChatMessage::system(&request.system_prompt),
                ChatMessage::user(&request.prompt),
            ];
            match provider.chat(&messages, Some(&options)).await {
                Ok(response) => {
                    debug!(
                        "{} input tokens, {} output tokens",
                        response.prompt_tokens, response.completion_tokens
                    );
                    Ok(SessionMessage::assistant_text(response.content))
                }
                Err(e) => Err(WorkbookError::PromptFailed {
                    message: e.to_string(),
                }),
            }
        }))
    }
}

/// Build `CompletionOptions` from the configured sampling settings.
fn build_options(temperature: Option<f32>, max_tokens: usize) -> CompletionOptions {
    CompletionOptions {
        temperature,
        max_tokens: Some(max_tokens),
        ..Default::default()
    }
}
