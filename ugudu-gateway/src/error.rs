//! [`GatewayError`] — the outcome of a call routed through [`crate::Gateway`].

use crate::rate_limit::RateLimitInfo;
use ugudu_types::ProviderError;

/// Errors a [`crate::Gateway`] can return in place of a raw [`ProviderError`].
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The provider is currently rate-limited and auto-resume is disabled,
    /// so the call is rejected immediately with the classified incident.
    #[error("rate limited: {info:?}")]
    RateLimited {
        /// The rate-limit window the caller hit (or inherited from the
        /// currently parked window).
        info: RateLimitInfo,
    },
    /// The park queue is at capacity; the caller must retry later.
    #[error("gateway queue is full")]
    QueueFull,
    /// The caller's context was cancelled while the request was parked or
    /// in flight.
    #[error("cancelled")]
    Cancelled,
    /// The underlying provider call failed for a reason unrelated to rate
    /// limiting.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl GatewayError {
    /// Map into a plain [`ProviderError`] for callers that only understand
    /// the bare `Provider` trait (e.g. an `AgentLoop` that wasn't built with
    /// gateway-awareness).
    #[must_use]
    pub fn into_provider_error(self) -> ProviderError {
        match self {
            GatewayError::RateLimited { info } => ProviderError::RateLimit {
                retry_after: info.retry_after,
                message: info.message.clone(),
            },
            GatewayError::QueueFull => {
                ProviderError::ServiceUnavailable("gateway queue is full".into())
            }
            GatewayError::Cancelled => {
                ProviderError::Other(Box::new(std::io::Error::other("gateway call cancelled")))
            }
            GatewayError::Provider(e) => e,
        }
    }
}
