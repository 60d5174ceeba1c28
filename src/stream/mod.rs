//! Streaming reply reassembly.
//!
//! [`subscribe`] turns an [`EventSource`](crate::EventSource) of low-level
//! protocol events into a [`ReplyStream`] of display-ready segments,
//! finished blocks and finally the assembled [`Message`](crate::Message).

mod accumulator;
mod engine;
mod reply;

pub use reply::{subscribe, subscribe_with, ReplyStream};

/// Tuning for a single subscription.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Elements buffered between the pump task and the consumer. The pump
    /// suspends when the buffer is full.
    pub buffer_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 64,
        }
    }
}

impl StreamConfig {
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }
}
