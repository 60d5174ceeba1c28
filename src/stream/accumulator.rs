use serde_json::Value;

use crate::error::StreamError;
use crate::events::{ContentSegment, Delta, DeltaKind, PartialToolUse, ToolUseStart};
use crate::types::{ContentBlock, ToolUseBlock};

/// Buffered payload of one block. One variant per payload kind, so a block
/// can never hold text and tool input at the same time.
#[derive(Debug, Clone, PartialEq)]
enum Accumulator {
    Text(String),
    ToolInput(String),
    Reasoning { text: String, signature: String },
    Redacted(Vec<u8>),
}

impl Accumulator {
    fn fresh(kind: DeltaKind) -> Self {
        match kind {
            DeltaKind::Text => Accumulator::Text(String::new()),
            DeltaKind::ToolInput => Accumulator::ToolInput(String::new()),
            DeltaKind::Reasoning => Accumulator::Reasoning {
                text: String::new(),
                signature: String::new(),
            },
            DeltaKind::RedactedReasoning => Accumulator::Redacted(Vec::new()),
        }
    }

    fn kind(&self) -> DeltaKind {
        match self {
            Accumulator::Text(_) => DeltaKind::Text,
            Accumulator::ToolInput(_) => DeltaKind::ToolInput,
            Accumulator::Reasoning { .. } => DeltaKind::Reasoning,
            Accumulator::Redacted(_) => DeltaKind::RedactedReasoning,
        }
    }

    /// Blank buffers do not pin the block's kind yet.
    fn is_blank(&self) -> bool {
        match self {
            Accumulator::Text(buf) | Accumulator::ToolInput(buf) => buf.is_empty(),
            Accumulator::Reasoning { text, signature } => text.is_empty() && signature.is_empty(),
            Accumulator::Redacted(data) => data.is_empty(),
        }
    }
}

/// Per-index state of an open content block.
#[derive(Debug, Default)]
pub(crate) struct Slot {
    start: Option<ToolUseStart>,
    state: Option<Accumulator>,
}

impl Slot {
    pub(crate) fn new(start: Option<ToolUseStart>) -> Self {
        Self { start, state: None }
    }

    /// Merge one delta and return the increment to show downstream.
    pub(crate) fn push(&mut self, index: u32, delta: Delta) -> Result<ContentSegment, StreamError> {
        if self.state.as_ref().is_some_and(Accumulator::is_blank) {
            self.state = None;
        }
        let kind = delta.kind();
        let state = self.state.get_or_insert_with(|| Accumulator::fresh(kind));

        match (state, delta) {
            (Accumulator::Text(buf), Delta::Text(text)) => {
                buf.push_str(&text);
                Ok(ContentSegment::Text { index, text })
            }
            (Accumulator::ToolInput(buf), Delta::ToolInputFragment(fragment)) => {
                let start = self
                    .start
                    .as_ref()
                    .ok_or(StreamError::MissingToolUseStart { index })?;
                buf.push_str(&fragment);
                Ok(ContentSegment::ToolUse {
                    index,
                    tool_use: PartialToolUse {
                        id: start.id.clone(),
                        name: start.name.clone(),
                        partial_input: buf.clone(),
                    },
                })
            }
            (Accumulator::Reasoning { text, .. }, Delta::ReasoningText(increment)) => {
                text.push_str(&increment);
                Ok(ContentSegment::Reasoning {
                    index,
                    text: Some(increment),
                    signature: None,
                })
            }
            (Accumulator::Reasoning { signature, .. }, Delta::ReasoningSignature(increment)) => {
                signature.push_str(&increment);
                Ok(ContentSegment::Reasoning {
                    index,
                    text: None,
                    signature: Some(increment),
                })
            }
            // Redacted payloads are whole values; a second one is rejected.
            (Accumulator::Redacted(held), Delta::RedactedReasoning(data)) if held.is_empty() => {
                held.clone_from(&data);
                Ok(ContentSegment::EncryptedReasoning { index, data })
            }
            (held, delta) => Err(StreamError::MixedContentKinds {
                index,
                held: held.kind(),
                received: delta.kind(),
            }),
        }
    }

    /// Turn the buffered payload into a finished block.
    pub(crate) fn finish(self, index: u32) -> Result<ContentBlock, StreamError> {
        match self.state {
            Some(Accumulator::Text(text)) if !text.is_empty() => Ok(ContentBlock::Text(text)),
            Some(Accumulator::Reasoning { text, signature })
                if !text.is_empty() || !signature.is_empty() =>
            {
                Ok(ContentBlock::Reasoning { text, signature })
            }
            Some(Accumulator::ToolInput(json)) => {
                let start = self.start.ok_or(StreamError::MissingToolUseStart { index })?;
                // Tools without arguments stream a single empty fragment.
                let input = if json.trim().is_empty() {
                    Value::Object(Default::default())
                } else {
                    serde_json::from_str(&json)
                        .map_err(|source| StreamError::InvalidToolInput { index, source })?
                };
                Ok(ContentBlock::ToolUse(ToolUseBlock {
                    id: start.id,
                    name: start.name,
                    input,
                }))
            }
            Some(Accumulator::Redacted(data)) if !data.is_empty() => {
                Ok(ContentBlock::EncryptedReasoning(data))
            }
            _ => Err(StreamError::EmptyContentBlock { index }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool_slot() -> Slot {
        Slot::new(Some(ToolUseStart {
            index: 0,
            name: "lookup".into(),
            id: "t1".into(),
        }))
    }

    #[test]
    fn text_concatenates() {
        let mut slot = Slot::default();
        slot.push(3, Delta::Text("a".into())).unwrap();
        let seg = slot.push(3, Delta::Text("b".into())).unwrap();
        assert_eq!(
            seg,
            ContentSegment::Text {
                index: 3,
                text: "b".into()
            }
        );
        assert_eq!(slot.finish(3).unwrap(), ContentBlock::Text("ab".into()));
    }

    #[test]
    fn tool_input_segments_carry_accumulated_input() {
        let mut slot = tool_slot();
        slot.push(0, Delta::ToolInputFragment("{\"q\":".into()))
            .unwrap();
        let seg = slot
            .push(0, Delta::ToolInputFragment("\"x\"}".into()))
            .unwrap();
        match seg {
            ContentSegment::ToolUse { tool_use, .. } => {
                assert_eq!(tool_use.id, "t1");
                assert_eq!(tool_use.partial_input, "{\"q\":\"x\"}");
            }
            other => panic!("unexpected segment: {other:?}"),
        }
        let block = slot.finish(0).unwrap();
        assert_eq!(
            block,
            ContentBlock::ToolUse(ToolUseBlock {
                id: "t1".into(),
                name: "lookup".into(),
                input: json!({"q": "x"}),
            })
        );
    }

    #[test]
    fn tool_input_without_start_is_rejected() {
        let mut slot = Slot::default();
        let err = slot
            .push(1, Delta::ToolInputFragment("{}".into()))
            .unwrap_err();
        assert!(matches!(err, StreamError::MissingToolUseStart { index: 1 }));
    }

    #[test]
    fn blank_tool_input_finishes_as_empty_object() {
        let mut slot = tool_slot();
        slot.push(0, Delta::ToolInputFragment(String::new())).unwrap();
        match slot.finish(0).unwrap() {
            ContentBlock::ToolUse(tool) => assert_eq!(tool.input, json!({})),
            other => panic!("unexpected block: {other:?}"),
        }
    }

    #[test]
    fn invalid_tool_input_fails_at_finish() {
        let mut slot = tool_slot();
        slot.push(0, Delta::ToolInputFragment("{\"q\":".into()))
            .unwrap();
        let err = slot.finish(0).unwrap_err();
        assert!(matches!(err, StreamError::InvalidToolInput { index: 0, .. }));
    }

    #[test]
    fn reasoning_text_and_signature_accumulate_independently() {
        let mut slot = Slot::default();
        slot.push(0, Delta::ReasoningText("let me ".into())).unwrap();
        let seg = slot
            .push(0, Delta::ReasoningSignature("sig-".into()))
            .unwrap();
        assert_eq!(
            seg,
            ContentSegment::Reasoning {
                index: 0,
                text: None,
                signature: Some("sig-".into())
            }
        );
        slot.push(0, Delta::ReasoningText("think".into())).unwrap();
        slot.push(0, Delta::ReasoningSignature("abc".into())).unwrap();
        assert_eq!(
            slot.finish(0).unwrap(),
            ContentBlock::Reasoning {
                text: "let me think".into(),
                signature: "sig-abc".into()
            }
        );
    }

    #[test]
    fn signature_only_reasoning_is_a_block() {
        let mut slot = Slot::default();
        slot.push(0, Delta::ReasoningSignature("sig".into())).unwrap();
        assert_eq!(
            slot.finish(0).unwrap(),
            ContentBlock::Reasoning {
                text: String::new(),
                signature: "sig".into()
            }
        );
    }

    #[test]
    fn reasoning_rejects_redacted_payload() {
        let mut slot = Slot::default();
        slot.push(0, Delta::ReasoningText("hmm".into())).unwrap();
        let err = slot
            .push(0, Delta::RedactedReasoning(b"opaque".to_vec()))
            .unwrap_err();
        assert!(matches!(
            err,
            StreamError::MixedContentKinds {
                held: DeltaKind::Reasoning,
                received: DeltaKind::RedactedReasoning,
                ..
            }
        ));
    }

    #[test]
    fn second_redacted_payload_is_rejected() {
        let mut slot = Slot::default();
        slot.push(0, Delta::RedactedReasoning(b"one".to_vec())).unwrap();
        let err = slot
            .push(0, Delta::RedactedReasoning(b"two".to_vec()))
            .unwrap_err();
        assert!(matches!(err, StreamError::MixedContentKinds { .. }));
    }

    #[test]
    fn redacted_payload_is_kept_whole() {
        let mut slot = Slot::default();
        let seg = slot
            .push(2, Delta::RedactedReasoning(b"opaque".to_vec()))
            .unwrap();
        assert_eq!(
            seg,
            ContentSegment::EncryptedReasoning {
                index: 2,
                data: b"opaque".to_vec()
            }
        );
        assert_eq!(
            slot.finish(2).unwrap(),
            ContentBlock::EncryptedReasoning(b"opaque".to_vec())
        );
    }

    #[test]
    fn blank_delta_does_not_pin_kind() {
        let mut slot = tool_slot();
        slot.push(0, Delta::Text(String::new())).unwrap();
        slot.push(0, Delta::ToolInputFragment("{}".into())).unwrap();
        assert!(matches!(slot.finish(0).unwrap(), ContentBlock::ToolUse(_)));
    }

    #[test]
    fn slot_without_deltas_is_empty() {
        let err = Slot::default().finish(4).unwrap_err();
        assert!(matches!(err, StreamError::EmptyContentBlock { index: 4 }));
    }

    #[test]
    fn blank_text_is_empty() {
        let mut slot = Slot::default();
        slot.push(0, Delta::Text(String::new())).unwrap();
        assert!(matches!(
            slot.finish(0).unwrap_err(),
            StreamError::EmptyContentBlock { index: 0 }
        ));
    }
}
