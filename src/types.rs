use serde_json::{json, Value};

/// Fully-formed request — the provider just sends it.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: Option<String>,
    pub tools: Vec<Value>,
    pub messages: Vec<Value>,
    pub thinking: Option<ThinkingConfig>,
}

/// Extended thinking settings. Models that support it stream reasoning
/// blocks alongside the reply.
#[derive(Debug, Clone, Copy)]
pub struct ThinkingConfig {
    pub budget_tokens: u32,
}

/// What came back from a one-shot call.
#[derive(Debug, Clone)]
pub struct InferenceResponse {
    pub stop_reason: StopReason,
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

impl InferenceResponse {
    /// The reply as an assistant [`Message`].
    pub fn message(&self) -> Message {
        Message::assistant(self.content.clone())
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    /// A reason this client does not model, e.g. `refusal` or `pause_turn`.
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUseBlock {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// One finished unit of model output.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text(String),
    ToolUse(ToolUseBlock),
    Reasoning { text: String, signature: String },
    /// Reasoning the service redacted. The payload is opaque and must be
    /// sent back untouched on follow-up turns.
    EncryptedReasoning(Vec<u8>),
}

impl ContentBlock {
    /// Anthropic wire representation, for replaying the block in history.
    pub fn to_json(&self) -> Value {
        match self {
            ContentBlock::Text(text) => json!({ "type": "text", "text": text }),
            ContentBlock::ToolUse(tool) => json!({
                "type": "tool_use",
                "id": tool.id,
                "name": tool.name,
                "input": tool.input,
            }),
            ContentBlock::Reasoning { text, signature } => json!({
                "type": "thinking",
                "thinking": text,
                "signature": signature,
            }),
            ContentBlock::EncryptedReasoning(data) => json!({
                "type": "redacted_thinking",
                "data": String::from_utf8_lossy(data),
            }),
        }
    }
}

/// A complete reply. Blocks appear in the order they finished streaming.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// All text blocks joined together. `None` when the reply has no text,
    /// which is an ordinary outcome (a pure tool call, for instance).
    pub fn text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.concat())
        }
    }

    pub fn tool_uses(&self) -> Vec<&ToolUseBlock> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse(tool) => Some(tool),
                _ => None,
            })
            .collect()
    }

    /// Reasoning text from every reasoning block, joined. Redacted
    /// reasoning is not included.
    pub fn reasoning(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Reasoning { text, .. } if !text.is_empty() => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }

    /// The message in the shape the messages API expects in `messages`.
    pub fn into_assistant_json(self) -> Value {
        let content: Vec<Value> = self.content.iter().map(ContentBlock::to_json).collect();
        json!({ "role": self.role.as_str(), "content": content })
    }
}

/// Token usage for a single inference call.
#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixed_message() -> Message {
        Message::assistant(vec![
            ContentBlock::Reasoning {
                text: "think".into(),
                signature: "sig".into(),
            },
            ContentBlock::Text("Hello, ".into()),
            ContentBlock::ToolUse(ToolUseBlock {
                id: "t1".into(),
                name: "lookup".into(),
                input: json!({"q": "x"}),
            }),
            ContentBlock::Text("world".into()),
        ])
    }

    #[test]
    fn text_joins_text_blocks() {
        assert_eq!(mixed_message().text().as_deref(), Some("Hello, world"));
    }

    #[test]
    fn text_absent_is_none() {
        let msg = Message::assistant(vec![ContentBlock::EncryptedReasoning(b"opaque".to_vec())]);
        assert_eq!(msg.text(), None);
        assert_eq!(msg.reasoning(), None);
        assert!(msg.tool_uses().is_empty());
    }

    #[test]
    fn tool_uses_and_reasoning() {
        let msg = mixed_message();
        let tools = msg.tool_uses();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "lookup");
        assert_eq!(msg.reasoning().as_deref(), Some("think"));
    }

    #[test]
    fn assistant_json_preserves_order_and_shapes() {
        let value = mixed_message().into_assistant_json();
        assert_eq!(value["role"], "assistant");
        let content = value["content"].as_array().unwrap();
        assert_eq!(content.len(), 4);
        assert_eq!(content[0]["type"], "thinking");
        assert_eq!(content[0]["signature"], "sig");
        assert_eq!(content[2]["type"], "tool_use");
        assert_eq!(content[2]["input"]["q"], "x");
        assert_eq!(content[3]["text"], "world");
    }

    #[test]
    fn redacted_reasoning_round_trips_data() {
        let block = ContentBlock::EncryptedReasoning(b"EqQBCgIYAh".to_vec());
        let value = block.to_json();
        assert_eq!(value["type"], "redacted_thinking");
        assert_eq!(value["data"], "EqQBCgIYAh");
    }
}
