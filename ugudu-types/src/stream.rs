//! Incremental completion streaming types.

use crate::error::ProviderError;
use crate::types::{ContentBlock, StopReason, TokenUsage};
use crate::wasm::WasmBoxedFuture;

/// One increment of a streamed completion.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A content block (text delta, tool-use delta, thinking delta) has arrived.
    Delta(ContentBlock),
    /// The model finished producing output for the current turn.
    MessageStop {
        /// Why the model stopped generating.
        stop_reason: StopReason,
        /// Token accounting for the completed message.
        usage: TokenUsage,
    },
    /// An error occurred mid-stream; no further events will follow.
    Error(StreamError),
}

/// An error surfaced while consuming a completion stream.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StreamError {
    /// The underlying provider call failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    /// The stream was closed before a terminal event was received.
    #[error("stream closed unexpectedly")]
    ClosedEarly,
    /// The stream produced malformed or undecodable data.
    #[error("malformed stream chunk: {0}")]
    Malformed(String),
}

/// A handle to an in-flight streamed completion.
///
/// Call [`StreamHandle::next`] in a loop until it returns `None` to drain
/// all events, or drop the handle to cancel the underlying request.
pub struct StreamHandle {
    receiver: tokio::sync::mpsc::Receiver<StreamEvent>,
}

impl StreamHandle {
    /// Build a handle around a channel receiver. Providers construct this
    /// by spawning a task that forwards decoded SSE/chunked events into the
    /// paired sender.
    pub fn new(receiver: tokio::sync::mpsc::Receiver<StreamEvent>) -> Self {
        Self { receiver }
    }

    /// Await the next event, or `None` once the stream is exhausted.
    pub fn next(&mut self) -> WasmBoxedFuture<'_, Option<StreamEvent>> {
        Box::pin(async move { self.receiver.recv().await })
    }
}
