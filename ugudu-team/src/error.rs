//! Errors surfaced by team construction and lifecycle.

use thiserror::Error;

/// Errors raised by [`crate::Team`] operations.
#[derive(Debug, Error)]
pub enum TeamError {
    /// A role's `model.provider` has no matching entry in the provider
    /// map handed to [`crate::Team::new`] — fatal at construction (§7).
    #[error("no provider registered for {0}")]
    UnregisteredProvider(String),

    /// The spec declared zero roles (also checked by `ugudu-spec`, but
    /// re-checked here since a caller could construct a `TeamSpec` by
    /// hand).
    #[error("team spec declares no roles")]
    NoRoles,

    /// `start` was called a second time on the same team.
    #[error("team already started")]
    AlreadyStarted,

    /// A role name has no live members (unknown or zero-count role).
    #[error("unknown role: {0}")]
    UnknownRole(String),

    /// The persistence port failed during start/stop.
    #[error("persistence error: {0}")]
    Persistence(#[from] ugudu_persist::PersistError),

    /// A member failed to start (only reachable if `Team::start` is
    /// somehow invoked twice through internal misuse, since `Team`
    /// itself guards against starting a team twice).
    #[error("member error: {0}")]
    Member(#[from] ugudu_member::MemberError),
}
