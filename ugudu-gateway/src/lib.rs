#![deny(missing_docs)]
//! Rate-limit-gated provider gateway for ugudu.
//!
//! Wraps a [`ugudu_types::Provider`] with a per-provider rate-limit state
//! machine: classifies 429-equivalent responses, parks callers across the
//! reset window, and resumes them in FIFO order once the window elapses.
//! See [`Gateway`] for the call path and [`rate_limit`] for the
//! classification rules.

mod error;
mod gateway;
pub mod queue;
pub mod rate_limit;

pub use error::GatewayError;
pub use gateway::{Gateway, GatewayConfig, GatewayStats};
pub use queue::{PendingId, PendingRequest, RequestQueue};
pub use rate_limit::{classify, GateState, RateLimitInfo, RateLimitKind, RateLimitState};
