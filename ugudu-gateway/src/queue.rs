//! Bounded FIFO park queue for rate-limited calls.

use std::collections::VecDeque;

use tokio::sync::oneshot;
use ugudu_types::CompletionRequest;

use crate::error::GatewayError;

/// Default bound on the number of calls a provider's gate may park at
/// once.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Unique id assigned to a parked request, used to remove it from the
/// queue if its caller cancels before the pump reaches it.
pub type PendingId = u64;

/// A call parked behind a rate-limit window, waiting to be replayed.
pub struct PendingRequest {
    /// Id used to find-and-remove this entry on cancellation.
    pub id: PendingId,
    /// The original request, replayed verbatim when the gate reopens.
    pub request: CompletionRequest,
    /// Delivers the eventual outcome back to the caller awaiting it.
    pub responder: oneshot::Sender<Result<ugudu_types::CompletionResponse, GatewayError>>,
}

/// Bounded FIFO queue of [`PendingRequest`]s.
pub struct RequestQueue {
    items: VecDeque<PendingRequest>,
    capacity: usize,
}

impl RequestQueue {
    /// Create an empty queue with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
        }
    }

    /// Enqueue a request. Returns it back, unconsumed, if the queue is at
    /// capacity.
    pub fn add(&mut self, req: PendingRequest) -> Result<(), PendingRequest> {
        if self.items.len() >= self.capacity {
            return Err(req);
        }
        self.items.push_back(req);
        Ok(())
    }

    /// Pop the oldest parked request.
    pub fn pop(&mut self) -> Option<PendingRequest> {
        self.items.pop_front()
    }

    /// Remove a specific entry by id (used when its caller cancels while
    /// still parked). No-op if the id is no longer present (already
    /// popped by the pump).
    pub fn remove(&mut self, id: PendingId) -> Option<PendingRequest> {
        let pos = self.items.iter().position(|p| p.id == id)?;
        self.items.remove(pos)
    }

    /// Drain every parked request (used on shutdown, so the gateway can
    /// fail them fast instead of leaving them parked forever).
    pub fn clear(&mut self) -> Vec<PendingRequest> {
        self.items.drain(..).collect()
    }

    /// Number of currently parked requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the queue holds no parked requests.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
