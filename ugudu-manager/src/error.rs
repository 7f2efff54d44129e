//! Errors surfaced by manager operations.

use thiserror::Error;

/// Errors raised by [`crate::Manager`] operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// No team is registered under the given instance name.
    #[error("unknown team: {0}")]
    UnknownTeam(String),

    /// `CreateTeam` was called with a name already in use.
    #[error("team already exists: {0}")]
    AlreadyExists(String),

    /// Reading a spec file off disk failed, outside of `ugudu-spec`'s own
    /// I/O error (e.g. during restore, before the spec is even parsed).
    #[error("failed to read spec at {path}: {source}")]
    SpecIo {
        /// The path that failed to read.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The spec at the recorded path failed to parse or validate.
    #[error("spec error: {0}")]
    Spec(#[from] ugudu_spec::SpecError),

    /// Team construction or lifecycle failed.
    #[error("team error: {0}")]
    Team(#[from] ugudu_team::TeamError),

    /// The persistence backend failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] ugudu_persist::PersistError),
}
