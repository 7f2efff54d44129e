//! Errors surfaced by the member runtime.

use thiserror::Error;

/// Errors raised by [`crate::Member`] operations.
#[derive(Debug, Error)]
pub enum MemberError {
    /// `start` was called a second time on the same member.
    #[error("member already started")]
    AlreadyStarted,

    /// The provider call failed outside of a task (i.e. during a direct
    /// client request), and is surfaced rather than recovered locally.
    #[error("provider error: {0}")]
    Provider(#[from] ugudu_types::ProviderError),

    /// Persisting or loading context failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] ugudu_persist::PersistError),
}
