//! Streaming sink used by capabilities to report partial output.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::envelope::ExecutionEnvelope;
use crate::error::{ToolError, ToolResult};

/// Item observed by a streaming consumer.
#[derive(Clone, Debug, PartialEq)]
pub enum InvocationEvent {
    /// Intermediate text emitted by the capability.
    Chunk(String),
    /// Terminal envelope. Always the last event of a stream.
    Finished(ExecutionEnvelope),
}

impl InvocationEvent {
    /// Returns `true` for the terminal event.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

struct SinkInner {
    tx: Option<mpsc::Sender<InvocationEvent>>,
    disconnected: CancellationToken,
    emitted: AtomicUsize,
}

/// Write side of an invocation's event stream.
///
/// Chunks are delivered in the order they are emitted. When the consumer goes
/// away the sink refuses further chunks and trips its disconnect token.
#[derive(Clone)]
pub struct StreamSink {
    inner: Arc<SinkInner>,
}

impl StreamSink {
    /// Creates a bounded sink together with the consumer stream.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, InvocationStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let sink = Self {
            inner: Arc::new(SinkInner {
                tx: Some(tx),
                disconnected: CancellationToken::new(),
                emitted: AtomicUsize::new(0),
            }),
        };
        (sink, InvocationStream { rx })
    }

    /// Creates a sink whose chunks are counted and dropped.
    #[must_use]
    pub fn discard() -> Self {
        Self {
            inner: Arc::new(SinkInner {
                tx: None,
                disconnected: CancellationToken::new(),
                emitted: AtomicUsize::new(0),
            }),
        }
    }

    /// Forwards a chunk to the consumer.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Cancelled`] once the consumer has disconnected.
    pub async fn emit(&self, chunk: impl Into<String>) -> ToolResult<()> {
        if self.inner.disconnected.is_cancelled() {
            return Err(ToolError::Cancelled);
        }

        if let Some(tx) = &self.inner.tx {
            if tx.send(InvocationEvent::Chunk(chunk.into())).await.is_err() {
                tracing::debug!("stream consumer dropped; refusing further chunks");
                self.inner.disconnected.cancel();
                return Err(ToolError::Cancelled);
            }
        }

        self.inner.emitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Sends the terminal envelope. Returns `false` if nobody is listening.
    pub async fn finish(&self, envelope: ExecutionEnvelope) -> bool {
        match &self.inner.tx {
            Some(tx) => tx.send(InvocationEvent::Finished(envelope)).await.is_ok(),
            None => true,
        }
    }

    /// Returns the number of chunks delivered so far.
    #[must_use]
    pub fn emitted(&self) -> usize {
        self.inner.emitted.load(Ordering::Relaxed)
    }

    /// Returns `true` once the consumer has gone away.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.inner.disconnected.is_cancelled()
            || self.inner.tx.as_ref().is_some_and(mpsc::Sender::is_closed)
    }

    /// Resolves when the consumer goes away.
    ///
    /// Never resolves for a discarding sink.
    pub async fn disconnected(&self) {
        match &self.inner.tx {
            Some(tx) => {
                tokio::select! {
                    () = self.inner.disconnected.cancelled() => {}
                    () = tx.closed() => self.inner.disconnected.cancel(),
                }
            }
            None => self.inner.disconnected.cancelled().await,
        }
    }
}

impl std::fmt::Debug for StreamSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSink")
            .field("emitted", &self.emitted())
            .field("disconnected", &self.is_disconnected())
            .finish()
    }
}

/// Read side of an invocation's event stream.
#[derive(Debug)]
pub struct InvocationStream {
    rx: mpsc::Receiver<InvocationEvent>,
}

impl InvocationStream {
    /// Receives the next event, or `None` once the stream is exhausted.
    pub async fn next_event(&mut self) -> Option<InvocationEvent> {
        self.rx.recv().await
    }

    /// Drains the stream, returning the chunks and the terminal envelope.
    pub async fn collect_all(mut self) -> (Vec<String>, Option<ExecutionEnvelope>) {
        let mut chunks = Vec::new();
        while let Some(event) = self.rx.recv().await {
            match event {
                InvocationEvent::Chunk(chunk) => chunks.push(chunk),
                InvocationEvent::Finished(envelope) => return (chunks, Some(envelope)),
            }
        }
        (chunks, None)
    }
}

impl Stream for InvocationStream {
    type Item = InvocationEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
