pub mod anthropic;
pub mod sse;

use async_trait::async_trait;

use crate::error::InferenceError;
use crate::events::EventSource;
use crate::types::{InferenceRequest, InferenceResponse};

/// Pure LLM API call. No state, no history, no context management.
/// Request in, response (or event stream) out.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// One-shot call. Waits for the complete reply.
    async fn infer(&self, request: InferenceRequest) -> Result<InferenceResponse, InferenceError>;

    /// Open a streaming call. Connection failures are reported here; later
    /// transport failures arrive as `Err` items on the returned source.
    async fn stream(&self, request: InferenceRequest) -> Result<EventSource, InferenceError>;
}

/// Blanket impl so `Box<dyn InferenceProvider>` can be passed directly to `Client::new()`.
#[async_trait]
impl InferenceProvider for Box<dyn InferenceProvider> {
    async fn infer(&self, request: InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        (**self).infer(request).await
    }

    async fn stream(&self, request: InferenceRequest) -> Result<EventSource, InferenceError> {
        (**self).stream(request).await
    }
}

pub use anthropic::AnthropicProvider;
pub use sse::SseDecoder;
