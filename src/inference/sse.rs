//! Server-sent event decoding for the Anthropic messages stream.
//!
//! Bytes go in as they arrive off the wire; [`StreamEvent`]s come out once
//! a complete frame (terminated by a blank line) has been buffered.

use bytes::Bytes;
use serde::Deserialize;
use tracing::warn;

use crate::error::InferenceError;
use crate::events::{Delta, StreamEvent, ToolUseStart};
use crate::types::Role;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    MessageStart {
        message: WireMessage,
    },
    ContentBlockStart {
        index: u32,
        content_block: WireBlock,
    },
    ContentBlockDelta {
        index: u32,
        delta: WireDelta,
    },
    ContentBlockStop {
        index: u32,
    },
    MessageDelta,
    MessageStop,
    Ping,
    Error {
        error: WireError,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    role: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(alias = "server_tool_use")]
    ToolUse {
        id: String,
        name: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    RedactedThinking {
        data: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    ThinkingDelta { thinking: String },
    SignatureDelta { signature: String },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

/// Incremental SSE frame decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    /// Trailing bytes of a UTF-8 sequence split across chunks.
    pending: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk. Returns every event completed by it, in order.
    pub fn push(&mut self, chunk: Bytes) -> Vec<Result<StreamEvent, InferenceError>> {
        self.pending.extend_from_slice(&chunk);
        self.drain_utf8();
        // A CRLF pair may straddle two chunks, so normalize the whole buffer.
        if self.buffer.contains("\r\n") {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut out = Vec::new();
        while let Some(end) = self.buffer.find("\n\n") {
            let frame: String = self.buffer.drain(..end + 2).collect();
            match decode_frame(&frame) {
                Ok(events) => out.extend(events.into_iter().map(Ok)),
                Err(e) => out.push(Err(e)),
            }
        }
        out
    }

    fn drain_utf8(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            self.pending.drain(..valid);
                            return;
                        }
                        Some(bad) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                    }
                }
            }
        }
    }
}

/// Decode one frame. Frames without data (comments, keep-alives) yield nothing.
fn decode_frame(frame: &str) -> Result<Vec<StreamEvent>, InferenceError> {
    let data: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|d| d.strip_prefix(' ').unwrap_or(d))
        .collect();
    if data.is_empty() {
        return Ok(vec![]);
    }
    let data = data.join("\n");
    if data == "[DONE]" {
        return Ok(vec![]);
    }
    decode_data(&data)
}

/// Map one JSON event payload to zero or more stream events.
pub fn decode_data(data: &str) -> Result<Vec<StreamEvent>, InferenceError> {
    let wire: WireEvent =
        serde_json::from_str(data).map_err(|e| InferenceError::Parse(e.to_string()))?;

    let events = match wire {
        WireEvent::MessageStart { message } => {
            let role = match message.role.as_str() {
                "assistant" => Role::Assistant,
                "user" => Role::User,
                other => {
                    return Err(InferenceError::Parse(format!("unknown role: {other}")));
                }
            };
            vec![StreamEvent::MessageStart { role }]
        }
        WireEvent::ContentBlockStart {
            index,
            content_block,
        } => block_start(index, content_block),
        WireEvent::ContentBlockDelta { index, delta } => {
            let delta = match delta {
                WireDelta::TextDelta { text } => Delta::Text(text),
                WireDelta::InputJsonDelta { partial_json } => Delta::ToolInputFragment(partial_json),
                WireDelta::ThinkingDelta { thinking } => Delta::ReasoningText(thinking),
                WireDelta::SignatureDelta { signature } => Delta::ReasoningSignature(signature),
                WireDelta::Unknown => {
                    warn!(index, "skipping unsupported delta type");
                    return Ok(vec![]);
                }
            };
            vec![StreamEvent::ContentBlockDelta { index, delta }]
        }
        WireEvent::ContentBlockStop { index } => vec![StreamEvent::ContentBlockStop { index }],
        WireEvent::MessageStop => vec![StreamEvent::MessageStop],
        WireEvent::MessageDelta | WireEvent::Ping => vec![],
        WireEvent::Error { error } => {
            return Err(InferenceError::Stream(format!(
                "{}: {}",
                error.kind, error.message
            )));
        }
        WireEvent::Unknown => {
            warn!("skipping unknown stream event");
            vec![]
        }
    };
    Ok(events)
}

fn block_start(index: u32, block: WireBlock) -> Vec<StreamEvent> {
    let mut events = Vec::with_capacity(2);
    let (hint, initial) = match block {
        WireBlock::Text { text } => (None, (!text.is_empty()).then(|| Delta::Text(text))),
        WireBlock::ToolUse { id, name } => (Some(ToolUseStart { index, name, id }), None),
        WireBlock::Thinking { thinking } => (
            None,
            (!thinking.is_empty()).then(|| Delta::ReasoningText(thinking)),
        ),
        // Redacted thinking arrives whole in the start event, never as deltas.
        WireBlock::RedactedThinking { data } => {
            (None, Some(Delta::RedactedReasoning(data.into_bytes())))
        }
        WireBlock::Unknown => {
            warn!(index, "opening block of unsupported type");
            (None, None)
        }
    };
    events.push(StreamEvent::ContentBlockStart { index, hint });
    if let Some(delta) = initial {
        events.push(StreamEvent::ContentBlockDelta { index, delta });
    }
    events
}
