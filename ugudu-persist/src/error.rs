//! [`PersistError`] — everything a [`crate::PersistencePort`] or
//! [`crate::Store`] can fail with.

/// Errors from a persistence adapter.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// The backing store rejected or failed the operation.
    #[error("backend error: {0}")]
    Backend(String),
    /// The requested team has no record.
    #[error("team not found: {0}")]
    TeamNotFound(String),
    /// The requested conversation has no record.
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),
    /// Serializing or deserializing a stored record failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}
