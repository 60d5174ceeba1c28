pub mod error;
pub mod events;
pub mod inference;
pub mod stream;
pub mod types;

use serde_json::Value;
use tracing::info;

pub use error::{ClientError, InferenceError, StreamError};
pub use events::{
    ContentSegment, Delta, DeltaKind, EventSource, PartialToolUse, StreamElement, StreamEvent,
    ToolUseStart,
};
pub use inference::{AnthropicProvider, InferenceProvider, SseDecoder};
pub use stream::{subscribe, subscribe_with, ReplyStream, StreamConfig};
pub use types::{
    ContentBlock, InferenceRequest, InferenceResponse, Message, Role, StopReason,
    ThinkingConfig, ToolUseBlock, Usage,
};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub model: String,
    pub max_tokens: u32,
    pub system: Option<String>,
    pub tools: Vec<Value>,
    pub thinking: Option<ThinkingConfig>,
    pub stream: StreamConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".into(),
            max_tokens: 4096,
            system: None,
            tools: Vec::new(),
            thinking: None,
            stream: StreamConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<Value>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_thinking(mut self, budget_tokens: u32) -> Self {
        self.thinking = Some(ThinkingConfig { budget_tokens });
        self
    }
}

/// Conversation client. Wire up a provider and ask for replies, either
/// whole or streamed.
pub struct Client {
    provider: Box<dyn InferenceProvider>,
    config: ClientConfig,
}

impl Client {
    pub fn new(provider: impl InferenceProvider + 'static, config: ClientConfig) -> Self {
        Self {
            provider: Box::new(provider),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Build the request for `messages` from the configured defaults.
    pub fn request(&self, messages: Vec<Value>) -> InferenceRequest {
        InferenceRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            system: self.config.system.clone(),
            tools: self.config.tools.clone(),
            messages,
            thinking: self.config.thinking,
        }
    }

    /// One-shot reply.
    pub async fn respond(&self, messages: Vec<Value>) -> Result<InferenceResponse, ClientError> {
        let request = self.request(messages);
        info!(model = %request.model, "one-shot request");
        Ok(self.provider.infer(request).await?)
    }

    /// Streamed reply. Dropping the returned stream cancels the call.
    pub async fn respond_streaming(&self, messages: Vec<Value>) -> Result<ReplyStream, ClientError> {
        let request = self.request(messages);
        info!(model = %request.model, "streaming request");
        let source = self.provider.stream(request).await?;
        Ok(subscribe_with(source, &self.config.stream))
    }

    /// Stream a reply and return its text. `Ok(None)` means the reply
    /// finished normally but held no text (e.g. only a tool call).
    pub async fn respond_text(&self, messages: Vec<Value>) -> Result<Option<String>, ClientError> {
        let message = self.respond_streaming(messages).await?.collect_message().await?;
        Ok(message.text())
    }
}
