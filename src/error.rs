use crate::events::DeltaKind;

/// Errors surfaced by the [`Client`](crate::Client) facade.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("inference error: {0}")]
    Inference(#[from] InferenceError),
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("API returned {status}: {body}")]
    ApiError { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    Parse(String),
    #[error("stream reported an error: {0}")]
    Stream(String),
    #[error("no API key configured (set ANTHROPIC_API_KEY)")]
    MissingApiKey,
}

/// Fatal reassembly failures. The first one ends the subscription and
/// discards everything accumulated so far.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("content block {index} was not opened")]
    IndexNotOpen { index: u32 },
    #[error("content block {index} is already open")]
    IndexAlreadyOpen { index: u32 },
    #[error("content block {index} holds {held} content, got a {received} delta")]
    MixedContentKinds {
        index: u32,
        held: DeltaKind,
        received: DeltaKind,
    },
    #[error("tool input for block {index} arrived without a tool-use start")]
    MissingToolUseStart { index: u32 },
    #[error("tool-use start for block {index} names block {hinted}")]
    ToolUseMismatch { index: u32, hinted: u32 },
    #[error("tool input for block {index} is not valid JSON: {source}")]
    InvalidToolInput {
        index: u32,
        #[source]
        source: serde_json::Error,
    },
    #[error("content block {index} stopped without any content")]
    EmptyContentBlock { index: u32 },
    #[error("upstream transport error: {0}")]
    Upstream(#[from] InferenceError),
    #[error("event source ended before message stop")]
    SourceEnded,
    #[error("stream cancelled")]
    Cancelled,
}
