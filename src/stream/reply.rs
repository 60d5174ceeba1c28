use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::engine::Reassembler;
use super::StreamConfig;
use crate::error::StreamError;
use crate::events::{EventSource, StreamElement};
use crate::types::Message;

type Item = Result<StreamElement, StreamError>;

/// Start reassembling `source` with the default [`StreamConfig`].
///
/// Must be called from within a Tokio runtime: the source is pumped by a
/// spawned task that lives exactly as long as the returned stream.
pub fn subscribe(source: EventSource) -> ReplyStream {
    subscribe_with(source, &StreamConfig::default())
}

pub fn subscribe_with(source: EventSource, config: &StreamConfig) -> ReplyStream {
    let (tx, rx) = mpsc::channel(config.buffer_capacity.max(1));
    let cancel = CancellationToken::new();
    debug!(buffer = config.buffer_capacity, "reply stream subscribed");
    let task = tokio::spawn(pump(source, tx, cancel.clone()));

    ReplyStream {
        rx,
        cancel,
        task: Some(task),
        finished: false,
    }
}

/// Drives the engine: pulls one event, handles it, pushes the result.
/// Both awaits race the cancellation token so a stalled source or a slow
/// consumer never keeps the task alive after teardown.
async fn pump(mut source: EventSource, tx: mpsc::Sender<Item>, cancel: CancellationToken) {
    let mut engine = Reassembler::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("reply stream cancelled while awaiting input");
                return;
            }
            next = source.next() => next,
        };

        let (item, terminal) = match next {
            Some(Ok(event)) => match engine.handle(event) {
                Ok(None) => continue,
                Ok(Some(element)) => {
                    let terminal = matches!(element, StreamElement::MessageComplete(_));
                    (Ok(element), terminal)
                }
                Err(e) => (Err(e), true),
            },
            Some(Err(e)) => {
                engine.fail();
                (Err(StreamError::Upstream(e)), true)
            }
            None => {
                engine.fail();
                (Err(StreamError::SourceEnded), true)
            }
        };

        if let Err(ref e) = item {
            warn!(error = %e, "reply stream failed");
        }

        let delivered = tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            sent = tx.send(item) => sent.is_ok(),
        };
        if !delivered {
            debug!("reply stream consumer gone, stopping pump");
            return;
        }
        if terminal {
            debug!(state = ?engine.state(), "reply stream finished");
            return;
        }
    }
}

/// Pull-based stream of [`StreamElement`]s for one reply.
///
/// Ends after `MessageComplete` or the first error. Dropping the stream,
/// or calling [`cancel`](Self::cancel), stops the pump task and releases
/// the event source.
pub struct ReplyStream {
    rx: mpsc::Receiver<Item>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    finished: bool,
}

impl ReplyStream {
    /// Stop the stream. Elements already buffered are discarded.
    pub fn cancel(&mut self) {
        self.finished = true;
        self.cancel.cancel();
        self.rx.close();
    }

    /// A token that cancels this stream from elsewhere, e.g. a Ctrl-C
    /// handler or a timeout racing the consumer.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drain the stream and return the assembled message.
    pub async fn collect_message(mut self) -> Result<Message, StreamError> {
        while let Some(item) = self.next().await {
            if let StreamElement::MessageComplete(message) = item? {
                return Ok(message);
            }
        }
        Err(StreamError::Cancelled)
    }
}

impl Stream for ReplyStream {
    type Item = Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Item>> {
        if self.finished || self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(item)) => {
                if matches!(item, Err(_) | Ok(StreamElement::MessageComplete(_))) {
                    self.finished = true;
                }
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ReplyStream {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
