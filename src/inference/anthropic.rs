use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tracing::debug;

use super::sse::SseDecoder;
use super::InferenceProvider;
use crate::error::InferenceError;
use crate::events::EventSource;
use crate::types::{
    ContentBlock, InferenceRequest, InferenceResponse, StopReason, ToolUseBlock, Usage,
};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Claude API client via Anthropic's messages endpoint.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_key)
    }

    /// Read the key from `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Result<Self, InferenceError> {
        std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(Self::new)
            .ok_or(InferenceError::MissingApiKey)
    }

    pub fn with_client(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn send(
        &self,
        request: InferenceRequest,
        stream: bool,
    ) -> Result<reqwest::Response, InferenceError> {
        let has_tools = !request.tools.is_empty();
        let thinking_enabled = request.thinking.is_some();
        let body = build_body(request, stream);

        let mut req = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json");

        // Interleaved thinking with tool use requires a beta header
        if thinking_enabled && has_tools {
            req = req.header("anthropic-beta", "interleaved-thinking-2025-05-14");
        }

        let resp = req
            .json(&body)
            .send()
            .await
            .map_err(|e| InferenceError::Request(e.to_string()))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp
                .text()
                .await
                .map_err(|e| InferenceError::Request(e.to_string()))?;
            return Err(InferenceError::ApiError { status, body });
        }
        Ok(resp)
    }
}

fn build_body(request: InferenceRequest, stream: bool) -> Value {
    let mut body = serde_json::json!({
        "model": request.model,
        "max_tokens": request.max_tokens,
        "messages": request.messages,
    });

    if let Some(system) = request.system {
        body["system"] = Value::String(system);
    }

    if !request.tools.is_empty() {
        body["tools"] = Value::Array(request.tools);
    }

    // Extended thinking
    if let Some(thinking) = request.thinking {
        body["thinking"] = serde_json::json!({
            "type": "enabled",
            "budget_tokens": thinking.budget_tokens,
        });
    }

    if stream {
        body["stream"] = Value::Bool(true);
    }
    body
}

fn parse_response(parsed: &Value) -> Result<InferenceResponse, InferenceError> {
    let stop_reason = match parsed["stop_reason"].as_str() {
        Some("end_turn") => StopReason::EndTurn,
        Some("tool_use") => StopReason::ToolUse,
        Some("max_tokens") => StopReason::MaxTokens,
        Some("stop_sequence") => StopReason::StopSequence,
        Some(other) => StopReason::Other(other.to_string()),
        None => return Err(InferenceError::Parse("missing stop_reason".into())),
    };

    let raw = parsed["content"].as_array().cloned().unwrap_or_default();
    let content = raw
        .iter()
        .filter_map(|block| match block["type"].as_str()? {
            "text" => Some(ContentBlock::Text(
                block["text"].as_str().unwrap_or("").to_string(),
            )),
            "thinking" => Some(ContentBlock::Reasoning {
                text: block["thinking"].as_str().unwrap_or("").to_string(),
                signature: block["signature"].as_str().unwrap_or("").to_string(),
            }),
            "redacted_thinking" => Some(ContentBlock::EncryptedReasoning(
                block["data"].as_str()?.as_bytes().to_vec(),
            )),
            "tool_use" => Some(ContentBlock::ToolUse(ToolUseBlock {
                id: block["id"].as_str()?.to_string(),
                name: block["name"].as_str()?.to_string(),
                input: block["input"].clone(),
            })),
            _ => None,
        })
        .collect();

    let usage = Usage {
        input_tokens: parsed["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: parsed["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
    };

    Ok(InferenceResponse {
        stop_reason,
        content,
        usage,
    })
}

#[async_trait]
impl InferenceProvider for AnthropicProvider {
    async fn infer(&self, request: InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        let text = self
            .send(request, false)
            .await?
            .text()
            .await
            .map_err(|e| InferenceError::Request(e.to_string()))?;

        let parsed: Value =
            serde_json::from_str(&text).map_err(|e| InferenceError::Parse(e.to_string()))?;
        parse_response(&parsed)
    }

    async fn stream(&self, request: InferenceRequest) -> Result<EventSource, InferenceError> {
        let model = request.model.clone();
        let resp = self.send(request, true).await?;
        debug!(%model, "streaming response opened");

        let mut decoder = SseDecoder::new();
        let events = resp
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => decoder.push(bytes),
                Err(e) => vec![Err(InferenceError::Request(format!(
                    "stream read error: {e}"
                )))],
            })
            .flat_map(futures::stream::iter);
        Ok(Box::pin(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ThinkingConfig;
    use serde_json::json;

    fn request() -> InferenceRequest {
        InferenceRequest {
            model: "claude-sonnet-4-20250514".into(),
            max_tokens: 1024,
            system: Some("Be brief.".into()),
            tools: vec![],
            messages: vec![json!({"role": "user", "content": "hi"})],
            thinking: None,
        }
    }

    #[test]
    fn body_includes_stream_flag_only_when_streaming() {
        let one_shot = build_body(request(), false);
        assert!(one_shot.get("stream").is_none());
        assert_eq!(one_shot["system"], "Be brief.");
        assert!(one_shot.get("tools").is_none());

        let streaming = build_body(request(), true);
        assert_eq!(streaming["stream"], true);
    }

    #[test]
    fn body_includes_thinking_budget() {
        let mut req = request();
        req.thinking = Some(ThinkingConfig {
            budget_tokens: 2048,
        });
        let body = build_body(req, true);
        assert_eq!(body["thinking"]["type"], "enabled");
        assert_eq!(body["thinking"]["budget_tokens"], 2048);
    }

    #[test]
    fn parses_mixed_content() {
        let parsed = json!({
            "stop_reason": "tool_use",
            "content": [
                {"type": "thinking", "thinking": "plan", "signature": "sig"},
                {"type": "redacted_thinking", "data": "opaque"},
                {"type": "text", "text": "Looking it up."},
                {"type": "tool_use", "id": "toolu_1", "name": "lookup", "input": {"q": "x"}},
                {"type": "mystery"}
            ],
            "usage": {"input_tokens": 12, "output_tokens": 7}
        });
        let resp = parse_response(&parsed).unwrap();
        assert_eq!(resp.stop_reason, StopReason::ToolUse);
        assert_eq!(resp.usage.input_tokens, 12);
        assert_eq!(
            resp.content,
            vec![
                ContentBlock::Reasoning {
                    text: "plan".into(),
                    signature: "sig".into()
                },
                ContentBlock::EncryptedReasoning(b"opaque".to_vec()),
                ContentBlock::Text("Looking it up.".into()),
                ContentBlock::ToolUse(ToolUseBlock {
                    id: "toolu_1".into(),
                    name: "lookup".into(),
                    input: json!({"q": "x"}),
                }),
            ]
        );
        assert_eq!(resp.message().text().as_deref(), Some("Looking it up."));
    }

    #[test]
    fn unlisted_stop_reason_is_kept() {
        let resp = parse_response(&json!({
            "stop_reason": "refusal",
            "content": [{"type": "text", "text": "I can't help with that."}]
        }))
        .unwrap();
        assert_eq!(resp.stop_reason, StopReason::Other("refusal".into()));
        assert_eq!(resp.content.len(), 1);
    }

    #[test]
    fn missing_stop_reason_is_parse_error() {
        let err = parse_response(&json!({"content": []})).unwrap_err();
        assert!(matches!(err, InferenceError::Parse(_)));
    }
}
