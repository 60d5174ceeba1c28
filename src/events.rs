use std::fmt;
use std::pin::Pin;

use futures::Stream;

use crate::error::InferenceError;
use crate::types::{ContentBlock, Message, Role};

/// Low-level protocol events, as delivered by an open streaming call.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    MessageStart {
        role: Role,
    },
    ContentBlockStart {
        index: u32,
        hint: Option<ToolUseStart>,
    },
    ContentBlockDelta {
        index: u32,
        delta: Delta,
    },
    ContentBlockStop {
        index: u32,
    },
    MessageStop,
}

/// Identity of a tool invocation, announced when its block opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolUseStart {
    pub index: u32,
    pub name: String,
    pub id: String,
}

/// Payload of a single `ContentBlockDelta`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    Text(String),
    ToolInputFragment(String),
    ReasoningText(String),
    ReasoningSignature(String),
    RedactedReasoning(Vec<u8>),
}

impl Delta {
    pub fn kind(&self) -> DeltaKind {
        match self {
            Delta::Text(_) => DeltaKind::Text,
            Delta::ToolInputFragment(_) => DeltaKind::ToolInput,
            Delta::ReasoningText(_) | Delta::ReasoningSignature(_) => DeltaKind::Reasoning,
            Delta::RedactedReasoning(_) => DeltaKind::RedactedReasoning,
        }
    }
}

/// Payload kind of a content block. Reasoning text and signature share one
/// kind since they build the same block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaKind {
    Text,
    ToolInput,
    Reasoning,
    RedactedReasoning,
}

impl fmt::Display for DeltaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeltaKind::Text => "text",
            DeltaKind::ToolInput => "tool input",
            DeltaKind::Reasoning => "reasoning",
            DeltaKind::RedactedReasoning => "redacted reasoning",
        })
    }
}

/// A tool call still being streamed. `partial_input` is the raw JSON text
/// received so far and is usually not parseable yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialToolUse {
    pub id: String,
    pub name: String,
    pub partial_input: String,
}

/// Display-ready increment. Carries only what is new, never the running total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSegment {
    Text {
        index: u32,
        text: String,
    },
    ToolUse {
        index: u32,
        tool_use: PartialToolUse,
    },
    Reasoning {
        index: u32,
        text: Option<String>,
        signature: Option<String>,
    },
    EncryptedReasoning {
        index: u32,
        data: Vec<u8>,
    },
}

impl ContentSegment {
    pub fn index(&self) -> u32 {
        match self {
            ContentSegment::Text { index, .. }
            | ContentSegment::ToolUse { index, .. }
            | ContentSegment::Reasoning { index, .. }
            | ContentSegment::EncryptedReasoning { index, .. } => *index,
        }
    }
}

/// Output of the reassembly engine.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamElement {
    Segment(ContentSegment),
    BlockComplete { index: u32, block: ContentBlock },
    MessageComplete(Message),
}

/// An open, cancellable feed of protocol events. Dropping it releases the
/// underlying connection.
pub type EventSource = Pin<Box<dyn Stream<Item = Result<StreamEvent, InferenceError>> + Send>>;
