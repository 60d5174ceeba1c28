use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::accumulator::Slot;
use crate::error::StreamError;
use crate::events::{StreamElement, StreamEvent};
use crate::types::{ContentBlock, Message, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EngineState {
    NotStarted,
    Running,
    Done,
    Failed,
}

/// Reassembles one streamed reply. Driven by a single loop, one event at a
/// time; never shared between subscriptions.
#[derive(Debug)]
pub(crate) struct Reassembler {
    state: EngineState,
    role: Option<Role>,
    /// Open indices and their accumulators. Absent means unopened or closed.
    open: HashMap<u32, Slot>,
    /// Finished blocks, in the order their stops arrived.
    finished: Vec<ContentBlock>,
}

impl Reassembler {
    pub(crate) fn new() -> Self {
        Self {
            state: EngineState::NotStarted,
            role: None,
            open: HashMap::new(),
            finished: Vec::new(),
        }
    }

    pub(crate) fn state(&self) -> EngineState {
        self.state
    }

    /// Apply one event. Returns the element to emit, if any. Once the
    /// engine is done or failed, further events are ignored.
    pub(crate) fn handle(
        &mut self,
        event: StreamEvent,
    ) -> Result<Option<StreamElement>, StreamError> {
        match self.state {
            EngineState::Done | EngineState::Failed => {
                debug!(?event, "ignoring event after terminal state");
                return Ok(None);
            }
            EngineState::NotStarted => self.state = EngineState::Running,
            EngineState::Running => {}
        }

        let result = self.dispatch(event);
        if result.is_err() {
            self.fail();
        }
        result
    }

    /// Enter the failed state and drop everything accumulated.
    pub(crate) fn fail(&mut self) {
        self.state = EngineState::Failed;
        self.open.clear();
        self.finished.clear();
    }

    fn dispatch(&mut self, event: StreamEvent) -> Result<Option<StreamElement>, StreamError> {
        match event {
            StreamEvent::MessageStart { role } => {
                if role != Role::Assistant {
                    warn!(role = role.as_str(), "stream announced a non-assistant role");
                }
                self.role = Some(role);
                Ok(None)
            }
            StreamEvent::ContentBlockStart { index, hint } => {
                if self.open.contains_key(&index) {
                    return Err(StreamError::IndexAlreadyOpen { index });
                }
                if let Some(ref start) = hint {
                    if start.index != index {
                        return Err(StreamError::ToolUseMismatch {
                            index,
                            hinted: start.index,
                        });
                    }
                }
                debug!(index, tool = hint.as_ref().map(|h| h.name.as_str()), "block opened");
                self.open.insert(index, Slot::new(hint));
                Ok(None)
            }
            StreamEvent::ContentBlockDelta { index, delta } => {
                let slot = self
                    .open
                    .get_mut(&index)
                    .ok_or(StreamError::IndexNotOpen { index })?;
                let segment = slot.push(index, delta)?;
                Ok(Some(StreamElement::Segment(segment)))
            }
            StreamEvent::ContentBlockStop { index } => {
                let slot = self
                    .open
                    .remove(&index)
                    .ok_or(StreamError::IndexNotOpen { index })?;
                let block = slot.finish(index)?;
                debug!(index, position = self.finished.len(), "block complete");
                self.finished.push(block.clone());
                Ok(Some(StreamElement::BlockComplete { index, block }))
            }
            StreamEvent::MessageStop => {
                if !self.open.is_empty() {
                    let mut unclosed: Vec<u32> = self.open.keys().copied().collect();
                    unclosed.sort_unstable();
                    warn!(?unclosed, "message stopped with open blocks, discarding them");
                    self.open.clear();
                }
                self.state = EngineState::Done;
                let content = std::mem::take(&mut self.finished);
                info!(blocks = content.len(), role = ?self.role, "message complete");
                Ok(Some(StreamElement::MessageComplete(Message::assistant(
                    content,
                ))))
            }
        }
    }
}
