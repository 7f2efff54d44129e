//! [`Gateway`]: wraps a [`Provider`] with rate-limit parking and auto-resume.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{oneshot, Mutex, Notify, RwLock};
use tokio::time::Instant as TokioInstant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use ugudu_types::{CompletionRequest, CompletionResponse, Provider, ProviderError};

use crate::error::GatewayError;
use crate::queue::{PendingRequest, RequestQueue, DEFAULT_QUEUE_CAPACITY};
use crate::rate_limit::{classify, GateState, RateLimitState, DEFAULT_WINDOW};

/// Configuration for a [`Gateway`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Whether to park and auto-resume callers on rate limit, or surface
    /// a typed error immediately.
    pub auto_resume: bool,
    /// Bound on the number of calls parked at once. Calls beyond the
    /// bound fail synchronously with [`GatewayError::QueueFull`].
    pub queue_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            auto_resume: true,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// A snapshot of gateway state, for observability.
#[derive(Debug, Clone)]
pub struct GatewayStats {
    /// Whether the gate is currently parking calls.
    pub is_limited: bool,
    /// The wall-clock instant calls will resume, if limited.
    pub resume_at: Option<chrono::DateTime<Utc>>,
    /// Number of calls currently parked.
    pub queue_len: usize,
}

/// Wraps a [`Provider`] with a rate-limit gate: classifies 429-equivalent
/// responses, parks callers across the reset window, and resumes them in
/// FIFO order via a background pump.
///
/// One `Gateway` guards one provider's rate-limit window. Implements
/// [`Provider`] itself, so it's a drop-in decorator anywhere a `Provider`
/// is expected.
pub struct Gateway<P> {
    inner: Arc<P>,
    config: GatewayConfig,
    state: Arc<RwLock<RateLimitState>>,
    queue: Arc<Mutex<RequestQueue>>,
    /// Fires whenever the pump extends `resume_at` or the gate reopens, so
    /// the pump task can re-evaluate its sleep deadline without polling.
    wake: Arc<Notify>,
    next_id: Arc<AtomicU64>,
    shutdown: CancellationToken,
    on_resume: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl<P> Clone for Gateway<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            config: self.config.clone(),
            state: Arc::clone(&self.state),
            queue: Arc::clone(&self.queue),
            wake: Arc::clone(&self.wake),
            next_id: Arc::clone(&self.next_id),
            shutdown: self.shutdown.clone(),
            on_resume: self.on_resume.clone(),
        }
    }
}

impl<P: Provider + Send + Sync + 'static> Gateway<P> {
    /// Wrap `inner` with a rate-limit gate. `shutdown` is the context the
    /// gateway parks calls under — cancelling it unblocks every parked
    /// caller and stops the background pump.
    #[must_use]
    pub fn new(inner: P, config: GatewayConfig, shutdown: CancellationToken) -> Self {
        let gateway = Self {
            inner: Arc::new(inner),
            queue: Arc::new(Mutex::new(RequestQueue::new(config.queue_capacity))),
            config,
            state: Arc::new(RwLock::new(RateLimitState::new())),
            wake: Arc::new(Notify::new()),
            next_id: Arc::new(AtomicU64::new(0)),
            shutdown,
            on_resume: None,
        };
        gateway.clone().spawn_pump();
        gateway
    }

    /// Register a callback fired exactly once per limited window, the
    /// moment the gate reopens.
    #[must_use]
    pub fn on_resume<F: Fn() + Send + Sync + 'static>(mut self, callback: F) -> Self {
        self.on_resume = Some(Arc::new(callback));
        self
    }

    /// Current observable state, for dashboards and tests.
    pub async fn stats(&self) -> GatewayStats {
        let state = self.state.read().await;
        let now = Utc::now();
        GatewayStats {
            is_limited: state.state(now) == GateState::Limited,
            resume_at: state.resume_at(),
            queue_len: self.queue.lock().await.len(),
        }
    }

    /// Whether the gate is currently parking calls.
    pub async fn is_limited(&self) -> bool {
        self.state.read().await.state(Utc::now()) == GateState::Limited
    }

    /// Issue a chat request through the gate.
    ///
    /// If the gate is open, calls straight through. If it's limited and
    /// auto-resume is disabled, fails immediately with
    /// [`GatewayError::RateLimited`]. If limited and auto-resume is
    /// enabled, parks the call and waits on either the gateway's shutdown
    /// token or the eventual replayed outcome.
    pub async fn call(&self, request: CompletionRequest) -> Result<CompletionResponse, GatewayError> {
        let now = Utc::now();
        let limited = {
            let state = self.state.read().await;
            state.state(now) == GateState::Limited
        };

        if !limited {
            return self.attempt(request).await;
        }

        if !self.config.auto_resume {
            let resume_at = self.state.read().await.resume_at();
            return Err(GatewayError::RateLimited {
                info: crate::rate_limit::RateLimitInfo {
                    kind: crate::rate_limit::RateLimitKind::Unknown,
                    retry_after: None,
                    reset_at: resume_at.unwrap_or(now + chrono::Duration::from_std(DEFAULT_WINDOW).unwrap()),
                    message: None,
                },
            });
        }

        self.park(request).await
    }

    /// Try the call directly against the inner provider. On a rate-limit
    /// response, classifies and records the incident, then either returns
    /// the typed error (auto-resume off) or parks the caller (auto-resume
    /// on).
    async fn attempt(&self, request: CompletionRequest) -> Result<CompletionResponse, GatewayError> {
        match self.inner.complete(request.clone()).await {
            Ok(response) => {
                if self.state.write().await.record_success(Utc::now()) {
                    self.fire_resume();
                }
                Ok(response)
            }
            Err(ProviderError::RateLimit { retry_after, message }) => {
                let info = classify(Utc::now(), retry_after, message.as_deref());
                self.state.write().await.record_incident(&info);
                self.wake.notify_one();
                if self.config.auto_resume {
                    self.park(request).await
                } else {
                    Err(GatewayError::RateLimited { info })
                }
            }
            Err(other) => Err(GatewayError::Provider(other)),
        }
    }

    /// Enqueue `request` and block until the pump replays it, the queue
    /// rejects it for being full, or the shutdown token fires.
    async fn park(&self, request: CompletionRequest) -> Result<CompletionResponse, GatewayError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let pending = PendingRequest { id, request, responder: tx };

        {
            let mut queue = self.queue.lock().await;
            if let Err(_rejected) = queue.add(pending) {
                return Err(GatewayError::QueueFull);
            }
        }
        self.wake.notify_one();

        tokio::select! {
            () = self.shutdown.cancelled() => {
                self.queue.lock().await.remove(id);
                Err(GatewayError::Cancelled)
            }
            result = rx => {
                result.unwrap_or(Err(GatewayError::Cancelled))
            }
        }
    }

    fn fire_resume(&self) {
        if let Some(callback) = self.on_resume.clone() {
            tokio::spawn(async move { callback() });
        }
    }

    /// Background task: sleeps until `resume_at`, then replays the queue
    /// head-first. A success reopens the gate and drains the rest of the
    /// queue one call at a time; a further rate limit re-parks and
    /// extends `resume_at`.
    fn spawn_pump(self) {
        tokio::spawn(async move {
            loop {
                let resume_at = { self.state.read().await.resume_at() };
                let Some(resume_at) = resume_at else {
                    tokio::select! {
                        () = self.shutdown.cancelled() => {
                            self.fail_all_parked().await;
                            return;
                        }
                        () = self.wake.notified() => continue,
                    }
                };

                let sleep_for = (resume_at - Utc::now())
                    .to_std()
                    .unwrap_or(std::time::Duration::ZERO);
                tokio::select! {
                    () = self.shutdown.cancelled() => {
                        self.fail_all_parked().await;
                        return;
                    }
                    () = self.wake.notified() => continue,
                    () = tokio::time::sleep_until(TokioInstant::now() + sleep_for) => {}
                }

                self.drain_one_round().await;
            }
        });
    }

    /// Replay the queue head; on success reopen the gate and replay every
    /// remaining entry; on a further rate limit, re-park and loop back to
    /// sleeping.
    async fn drain_one_round(&self) {
        loop {
            let head = { self.queue.lock().await.pop() };
            let Some(pending) = head else { return };

            match self.inner.complete(pending.request.clone()).await {
                Ok(response) => {
                    if self.state.write().await.record_success(Utc::now()) {
                        self.fire_resume();
                    }
                    let _ = pending.responder.send(Ok(response));
                }
                Err(ProviderError::RateLimit { retry_after, message }) => {
                    let info = classify(Utc::now(), retry_after, message.as_deref());
                    self.state.write().await.record_incident(&info);
                    // Re-queue at the front conceptually by putting it
                    // back and stopping this round; the pump sleeps again.
                    let mut queue = self.queue.lock().await;
                    let mut requeued = RequestQueue::new(queue.len() + 1);
                    let _ = requeued.add(pending);
                    while let Some(p) = queue.pop() {
                        let _ = requeued.add(p);
                    }
                    *queue = requeued;
                    debug!("gateway: re-parked after repeat rate limit, resume_at extended");
                    return;
                }
                Err(other) => {
                    let _ = pending.responder.send(Err(GatewayError::Provider(other)));
                }
            }
        }
    }

    async fn fail_all_parked(&self) {
        let drained = self.queue.lock().await.clear();
        for pending in drained {
            let _ = pending.responder.send(Err(GatewayError::Cancelled));
        }
    }
}

impl<P: Provider + Send + Sync + 'static> Provider for Gateway<P> {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        self.call(request).await.map_err(GatewayError::into_provider_error)
    }

    async fn complete_stream(
        &self,
        request: CompletionRequest,
    ) -> Result<ugudu_types::StreamHandle, ProviderError> {
        // Streaming bypasses the gate: incremental token streams can't be
        // meaningfully parked and replayed.
        self.inner.complete_stream(request).await
    }
}
